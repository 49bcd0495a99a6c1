use tracing::{debug, instrument};

use crate::assistant_api::{AssistantApi, Role, ThreadMessage};
use crate::error::RelayError;

/// Picks the reply a run produced out of a thread listing.
///
/// Only assistant messages tagged with `run_id` count. Among those, the one
/// with the latest `created_at` wins; on a tie the earlier entry in the
/// listing wins, since listings are newest first.
pub fn select_reply(messages: &[ThreadMessage], run_id: &str) -> Option<String> {
    messages
        .iter()
        .filter(|m| m.role == Role::Assistant && m.run_id.as_deref() == Some(run_id))
        .reduce(|latest, m| if m.created_at > latest.created_at { m } else { latest })
        .map(ThreadMessage::text)
}

/// Lists the thread and returns the reply of `run_id`, if it left one.
#[instrument(skip(api))]
pub async fn extract_reply(api: &dyn AssistantApi, thread_id: &str, run_id: &str) -> Result<Option<String>, RelayError> {
    let messages = api.list_messages(thread_id).await.map_err(RelayError::Extract)?;
    let reply = select_reply(&messages, run_id);
    debug!(found = reply.is_some(), listed = messages.len(), "Selected run reply");
    Ok(reply)
}
