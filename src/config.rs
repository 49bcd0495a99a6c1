//! Command-line and environment configuration.
//!
//! Every setting is a `clap` argument with an environment fallback, so a
//! `.env` file (loaded with `dotenvy` before parsing) is enough to run.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;
use tracing::info;

use crate::assistant_api::{AssistantApi, OpenAiAssistantClient, DEFAULT_API_BASE};
use crate::chat::ChatService;
use crate::poller::{PollPolicy, DEFAULT_MAX_POLL_ATTEMPTS};

/// Options shared by every command that talks to the assistant service.
#[derive(Args, Debug, Clone)]
pub struct RemoteArgs {
    /// API key for the assistant service.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Identifier of the assistant to chat with.
    #[arg(long, env = "ASSISTANT_ID")]
    pub assistant_id: String,

    /// Base URL of the assistant service API.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Delay before each run status check, in milliseconds.
    #[arg(long, env = "RELAY_POLL_INTERVAL_MS", default_value_t = 2000)]
    pub poll_interval_ms: u64,

    /// Number of run status checks before giving up.
    #[arg(long, env = "RELAY_MAX_POLL_ATTEMPTS", default_value_t = DEFAULT_MAX_POLL_ATTEMPTS)]
    pub max_poll_attempts: u32,

    /// Name shown next to the assistant's replies.
    #[arg(long, env = "ASSISTANT_DISPLAY_NAME", default_value = "Asghar")]
    pub assistant_name: String,
}

impl RemoteArgs {
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            bail!("API key must not be empty (set OPENAI_API_KEY or --api-key)");
        }
        if self.assistant_id.trim().is_empty() {
            bail!("assistant id must not be empty (set ASSISTANT_ID or --assistant-id)");
        }
        if self.max_poll_attempts == 0 {
            bail!("--max-poll-attempts must be at least 1");
        }
        if self.poll_policy().budget().is_none() {
            bail!("--poll-interval-ms times --max-poll-attempts is too large");
        }
        Ok(())
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_poll_attempts,
        }
    }

    /// Validates the options and builds the chat service they describe.
    pub fn chat_service(&self) -> Result<ChatService> {
        self.validate()?;
        let api: Arc<dyn AssistantApi> = Arc::new(OpenAiAssistantClient::new(
            self.api_base.clone(),
            self.api_key.trim(),
        ));
        let policy = self.poll_policy();
        info!(
            interval = ?policy.interval,
            attempts = policy.max_attempts,
            budget = ?policy.budget(),
            "Run poll budget"
        );
        Ok(ChatService::new(api, self.assistant_id.trim(), policy))
    }
}
