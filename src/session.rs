use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{error, info, instrument};

use crate::assistant_api::{Assistant, AssistantApi, Thread};
use crate::error::{ApiError, RelayError};

/// The assistant definition and the conversation thread a relay talks to.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub assistant: Assistant,
    pub thread: Thread,
}

/// Lazily creates the one [`Session`] and keeps it for the life of the value.
///
/// The assistant lookup and the thread creation are a single initialization:
/// either both are cached or neither is, and a failed attempt is retried from
/// scratch on the next call.
pub struct SessionManager {
    api: Arc<dyn AssistantApi>,
    assistant_id: String,
    session: OnceCell<Session>,
}

impl SessionManager {
    pub fn new(api: Arc<dyn AssistantApi>, assistant_id: impl Into<String>) -> Self {
        Self {
            api,
            assistant_id: assistant_id.into(),
            session: OnceCell::new(),
        }
    }

    #[instrument(skip(self), fields(assistant_id = %self.assistant_id))]
    pub async fn ensure_ready(&self) -> Result<&Session, RelayError> {
        self.session
            .get_or_try_init(|| async {
                let assistant = self.api.retrieve_assistant(&self.assistant_id).await?;
                let thread = self.api.create_thread().await?;
                info!(assistant = %assistant.id, thread = %thread.id, "Assistant session ready");
                Ok::<_, ApiError>(Session { assistant, thread })
            })
            .await
            .map_err(|e| {
                error!("Failed to initialize assistant session: {}", e);
                RelayError::SessionInit(e)
            })
    }

    /// The cached session, if initialization has succeeded.
    pub fn current(&self) -> Option<&Session> {
        self.session.get()
    }
}
