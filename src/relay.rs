use tracing::{debug, instrument};

use crate::assistant_api::{AssistantApi, Run};
use crate::error::RelayError;
use crate::session::Session;

/// Appends `text` to the session thread as a user message and starts a run
/// with the session assistant's id and instructions.
///
/// `text` is expected to be trimmed and non-empty already.
#[instrument(skip(api, session, text), fields(thread = %session.thread.id))]
pub async fn submit_and_run(api: &dyn AssistantApi, session: &Session, text: &str) -> Result<Run, RelayError> {
    let message = api
        .create_message(&session.thread.id, text)
        .await
        .map_err(RelayError::Submit)?;
    debug!(message_id = %message.id, "Posted user message");

    let run = api
        .create_run(
            &session.thread.id,
            &session.assistant.id,
            session.assistant.instructions.as_deref(),
        )
        .await
        .map_err(RelayError::Submit)?;
    debug!(run_id = %run.id, status = ?run.status, "Started run");

    Ok(run)
}
