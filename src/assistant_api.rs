//! Client for the hosted assistant service (OpenAI Assistants API, v2).
//!
//! Only the calls a chat turn needs are modelled, and only the fields the
//! relay reads are deserialized.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::error::ApiError;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Page size used when listing thread messages. The current run's replies
/// are the newest entries, so one page is enough.
const MESSAGE_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Assistant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IncompleteDetails {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Run {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub assistant_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
    #[serde(default)]
    pub incomplete_details: Option<IncompleteDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextValue {
    pub value: String,
}

/// One segment of a message body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextValue },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    /// Text segments joined with a single space; non-text segments are skipped.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|segment| match segment {
                MessageContent::Text { text } => Some(text.value.as_str()),
                MessageContent::Unsupported => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Serialize)]
struct CreateMessageRequest<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// The remote operations a chat turn consumes.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, ApiError>;

    async fn create_thread(&self) -> Result<Thread, ApiError>;

    async fn create_message(&self, thread_id: &str, text: &str) -> Result<ThreadMessage, ApiError>;

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        instructions: Option<&str>,
    ) -> Result<Run, ApiError>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError>;

    /// Asks the service to stop a run that is still active.
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError>;

    /// Messages on the thread, newest first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ApiError>;
}

/// `reqwest` implementation of [`AssistantApi`].
#[derive(Clone)]
pub struct OpenAiAssistantClient {
    client: Client,
    api_base: String,
    api_key: String,
}

impl std::fmt::Debug for OpenAiAssistantClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAssistantClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl OpenAiAssistantClient {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(Client::new(), api_base, api_key)
    }

    pub fn with_client(client: Client, api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self {
            client,
            api_base,
            api_key: api_key.into(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send<T: DeserializeOwned>(&self, url: String, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            error!(%status, %url, %message, "Assistant API request failed");
            return Err(ApiError::Status { url, status, message });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| ApiError::Decode { url, source })
    }
}

#[async_trait]
impl AssistantApi for OpenAiAssistantClient {
    #[instrument(skip(self))]
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, ApiError> {
        let url = self.url(&format!("/assistants/{}", assistant_id));
        let assistant: Assistant = self.send(url.clone(), self.client.get(&url)).await?;
        debug!(name = ?assistant.name, model = ?assistant.model, "Retrieved assistant");
        Ok(assistant)
    }

    #[instrument(skip(self))]
    async fn create_thread(&self) -> Result<Thread, ApiError> {
        let url = self.url("/threads");
        let thread: Thread = self
            .send(url.clone(), self.client.post(&url).json(&serde_json::json!({})))
            .await?;
        debug!(thread_id = %thread.id, "Created thread");
        Ok(thread)
    }

    #[instrument(skip(self, text))]
    async fn create_message(&self, thread_id: &str, text: &str) -> Result<ThreadMessage, ApiError> {
        let url = self.url(&format!("/threads/{}/messages", thread_id));
        let body = CreateMessageRequest {
            role: Role::User,
            content: text,
        };
        self.send(url.clone(), self.client.post(&url).json(&body)).await
    }

    #[instrument(skip(self, instructions))]
    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        instructions: Option<&str>,
    ) -> Result<Run, ApiError> {
        let url = self.url(&format!("/threads/{}/runs", thread_id));
        let body = CreateRunRequest {
            assistant_id,
            instructions,
        };
        let run: Run = self.send(url.clone(), self.client.post(&url).json(&body)).await?;
        debug!(run_id = %run.id, status = ?run.status, "Created run");
        Ok(run)
    }

    #[instrument(skip(self))]
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError> {
        let url = self.url(&format!("/threads/{}/runs/{}", thread_id, run_id));
        self.send(url.clone(), self.client.get(&url)).await
    }

    #[instrument(skip(self))]
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError> {
        let url = self.url(&format!("/threads/{}/runs/{}/cancel", thread_id, run_id));
        let run: Run = self.send(url.clone(), self.client.post(&url)).await?;
        debug!(status = ?run.status, "Requested run cancellation");
        Ok(run)
    }

    #[instrument(skip(self))]
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ApiError> {
        let url = self.url(&format!("/threads/{}/messages", thread_id));
        let request = self.client.get(&url).query(&[
            ("order", "desc".to_string()),
            ("limit", MESSAGE_PAGE_LIMIT.to_string()),
        ]);
        let list: MessageList = self.send(url, request).await?;
        debug!(count = list.data.len(), "Listed thread messages");
        Ok(list.data)
    }
}
