// One conversational turn against the hosted assistant, shared by the web
// endpoint and the terminal chat.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::assistant_api::AssistantApi;
use crate::error::RelayError;
use crate::extractor;
use crate::poller::{PollOutcome, PollPolicy, RunPoller};
use crate::relay;
use crate::session::SessionManager;

/// Owns the conversation: the lazily created session, the poller, and a turn
/// lock so only one message is in flight on the thread at a time.
pub struct ChatService {
    api: Arc<dyn AssistantApi>,
    sessions: SessionManager,
    poller: RunPoller,
    turn: Mutex<()>,
}

impl ChatService {
    pub fn new(api: Arc<dyn AssistantApi>, assistant_id: impl Into<String>, policy: PollPolicy) -> Self {
        Self {
            sessions: SessionManager::new(api.clone(), assistant_id),
            poller: RunPoller::new(api.clone(), policy),
            api,
            turn: Mutex::new(()),
        }
    }

    /// Posts `text`, waits for the run, and returns the assistant's reply.
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn send(&self, text: &str) -> Result<String, RelayError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RelayError::EmptyMessage);
        }

        let _turn = self.turn.lock().await;
        let session = self.sessions.ensure_ready().await?;

        let run = relay::submit_and_run(self.api.as_ref(), session, text).await?;
        let waited = match self.poller.await_completion(&session.thread.id, &run.id).await {
            Ok(PollOutcome::Completed(_)) => Ok(()),
            Ok(PollOutcome::Exhausted { attempts }) => Err(RelayError::RunTimedOut { attempts }),
            Err(e) => Err(e),
        };
        if let Err(e) = waited {
            if e.leaves_run_active() {
                self.cancel_run(&session.thread.id, &run.id).await;
            }
            return Err(e);
        }

        extractor::extract_reply(self.api.as_ref(), &session.thread.id, &run.id)
            .await?
            .ok_or(RelayError::NoReply { run_id: run.id })
    }

    /// Best effort: a failed cancel is logged and the turn's own error wins.
    async fn cancel_run(&self, thread_id: &str, run_id: &str) {
        match self.api.cancel_run(thread_id, run_id).await {
            Ok(run) => info!(run_id, status = ?run.status, "Cancelled abandoned run"),
            Err(e) => warn!(run_id, "Failed to cancel abandoned run: {}", e),
        }
    }
}

/// Line-oriented chat over any reader/writer pair. Blank lines are skipped;
/// `/quit` or end of input ends the session. A failed turn prints the same
/// apology the web page shows and the loop continues.
pub async fn run_terminal_chat<R, W>(service: &ChatService, assistant_name: &str, input: R, mut output: W) -> Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Starting terminal chat...");
    let mut lines = BufReader::new(input).lines();
    output.write_all(b"Type a message, or /quit to leave.\n").await?;
    output.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }

        let reply = match service.send(line).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Chat turn failed: {}", e);
                FALLBACK_REPLY.to_string()
            }
        };
        output
            .write_all(format!("{}: {}\n", assistant_name, reply).as_bytes())
            .await?;
        output.flush().await?;
    }

    info!("Terminal chat finished.");
    Ok(())
}

/// Shown in place of a reply when a turn fails.
pub const FALLBACK_REPLY: &str = "Sorry, something went wrong.";
