use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to the remote assistant service.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {message}")]
    Status {
        url: String,
        status: StatusCode,
        message: String,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Everything that can go wrong during one chat turn.
///
/// None of these reach the HTTP client verbatim; the endpoint logs them and
/// answers with a generic payload.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("failed to initialize assistant session: {0}")]
    SessionInit(#[source] ApiError),

    #[error("failed to submit message: {0}")]
    Submit(#[source] ApiError),

    #[error("failed to query run status: {0}")]
    Poll(#[source] ApiError),

    #[error("failed to list thread messages: {0}")]
    Extract(#[source] ApiError),

    #[error("Run requires action and is waiting for input.")]
    RunRequiresAction,

    #[error("Run expired.")]
    RunExpired,

    #[error("Run failed: {reason}")]
    RunFailed { reason: String },

    #[error("Run was cancelled.")]
    RunCancelled,

    #[error("Run ended incomplete: {reason}")]
    RunIncomplete { reason: String },

    #[error("Run did not finish after {attempts} status checks")]
    RunTimedOut { attempts: u32 },

    #[error("run {run_id} completed without an assistant reply")]
    NoReply { run_id: String },

    #[error("message must not be empty")]
    EmptyMessage,

    #[error("chat turn task aborted: {0}")]
    TurnAborted(String),
}

impl RelayError {
    /// True when the turn ended while the remote run can still be active,
    /// which keeps the thread locked for new messages until it is cancelled.
    pub fn leaves_run_active(&self) -> bool {
        matches!(self, RelayError::RunRequiresAction | RelayError::RunTimedOut { .. })
    }
}
