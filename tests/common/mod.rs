#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use assistant_relay::assistant_api::{
    Assistant, AssistantApi, MessageContent, Role, Run, RunError, RunStatus, TextValue, Thread, ThreadMessage,
};
use assistant_relay::error::ApiError;
use async_trait::async_trait;
use reqwest::StatusCode;

/// In-memory stand-in for the assistant service.
///
/// `retrieve_run` hands out the scripted statuses in order and then repeats
/// the last one. Every call is counted and appended to `calls` in order.
pub struct ScriptedApi {
    pub assistant_calls: AtomicUsize,
    pub thread_calls: AtomicUsize,
    pub message_calls: AtomicUsize,
    pub run_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    calls: Mutex<Vec<String>>,
    fail_assistant: Mutex<usize>,
    fail_thread: Mutex<usize>,
    fail_cancel: Mutex<usize>,
    statuses: Mutex<VecDeque<RunStatus>>,
    last_status: Mutex<RunStatus>,
    failure_reason: Mutex<Option<String>>,
    reply: Mutex<Option<String>>,
    messages: Mutex<Vec<ThreadMessage>>,
    next_run: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            assistant_calls: AtomicUsize::new(0),
            thread_calls: AtomicUsize::new(0),
            message_calls: AtomicUsize::new(0),
            run_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            fail_assistant: Mutex::new(0),
            fail_thread: Mutex::new(0),
            fail_cancel: Mutex::new(0),
            statuses: Mutex::new(VecDeque::new()),
            last_status: Mutex::new(RunStatus::Completed),
            failure_reason: Mutex::new(None),
            reply: Mutex::new(Some("hi there".to_string())),
            messages: Mutex::new(Vec::new()),
            next_run: AtomicUsize::new(1),
        }
    }

    pub fn with_statuses(self, statuses: &[RunStatus]) -> Self {
        *self.statuses.lock().unwrap() = statuses.iter().copied().collect();
        if let Some(last) = statuses.last() {
            *self.last_status.lock().unwrap() = *last;
        }
        self
    }

    pub fn with_failure_reason(self, reason: &str) -> Self {
        *self.failure_reason.lock().unwrap() = Some(reason.to_string());
        self
    }

    /// The text the assistant posts when a run completes; `None` posts nothing.
    pub fn with_reply(self, reply: Option<&str>) -> Self {
        *self.reply.lock().unwrap() = reply.map(str::to_string);
        self
    }

    /// Fail the next `times` assistant lookups.
    pub fn failing_assistant(self, times: usize) -> Self {
        *self.fail_assistant.lock().unwrap() = times;
        self
    }

    /// Fail the next `times` thread creations.
    pub fn failing_thread(self, times: usize) -> Self {
        *self.fail_thread.lock().unwrap() = times;
        self
    }

    /// Fail the next `times` run cancellations.
    pub fn failing_cancel(self, times: usize) -> Self {
        *self.fail_cancel.lock().unwrap() = times;
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Remote calls made so far, e.g. `create_message:one` or `retrieve_run:run_1`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    /// Seeds the thread listing with an existing message.
    pub fn push_message(&self, message: ThreadMessage) {
        self.messages.lock().unwrap().push(message);
    }

    fn unavailable(path: &str) -> ApiError {
        ApiError::Status {
            url: format!("http://scripted{}", path),
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "scripted outage".to_string(),
        }
    }

    fn take_failure(slot: &Mutex<usize>) -> bool {
        let mut remaining = slot.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            true
        } else {
            false
        }
    }

    fn next_status(&self) -> RunStatus {
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(*self.last_status.lock().unwrap())
    }

    fn created_at(&self) -> i64 {
        self.messages.lock().unwrap().len() as i64 + 1
    }
}

pub fn assistant_message(id: &str, run_id: &str, created_at: i64, text: &str) -> ThreadMessage {
    ThreadMessage {
        id: id.to_string(),
        role: Role::Assistant,
        run_id: Some(run_id.to_string()),
        created_at,
        content: vec![MessageContent::Text {
            text: TextValue {
                value: text.to_string(),
            },
        }],
    }
}

#[async_trait]
impl AssistantApi for ScriptedApi {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, ApiError> {
        self.assistant_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.fail_assistant) {
            return Err(Self::unavailable("/assistants"));
        }
        Ok(Assistant {
            id: assistant_id.to_string(),
            name: Some("Asghar".to_string()),
            model: Some("gpt-4o".to_string()),
            instructions: Some("Be helpful.".to_string()),
        })
    }

    async fn create_thread(&self) -> Result<Thread, ApiError> {
        let n = self.thread_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.fail_thread) {
            return Err(Self::unavailable("/threads"));
        }
        Ok(Thread {
            id: format!("thread_{}", n + 1),
            created_at: 0,
        })
    }

    async fn create_message(&self, _thread_id: &str, text: &str) -> Result<ThreadMessage, ApiError> {
        self.message_calls.fetch_add(1, Ordering::SeqCst);
        self.record(format!("create_message:{}", text));
        let message = ThreadMessage {
            id: format!("msg_user_{}", self.created_at()),
            role: Role::User,
            run_id: None,
            created_at: self.created_at(),
            content: vec![MessageContent::Text {
                text: TextValue {
                    value: text.to_string(),
                },
            }],
        };
        self.messages.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        _instructions: Option<&str>,
    ) -> Result<Run, ApiError> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        let n = self.next_run.fetch_add(1, Ordering::SeqCst);
        self.record(format!("create_run:run_{}", n));
        Ok(Run {
            id: format!("run_{}", n),
            thread_id: thread_id.to_string(),
            assistant_id: assistant_id.to_string(),
            status: RunStatus::Queued,
            last_error: None,
            incomplete_details: None,
        })
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.record(format!("retrieve_run:{}", run_id));
        let status = self.next_status();
        let last_error = match status {
            RunStatus::Failed => self.failure_reason.lock().unwrap().clone().map(|message| RunError {
                code: Some("server_error".to_string()),
                message,
            }),
            _ => None,
        };
        if status == RunStatus::Completed {
            if let Some(reply) = self.reply.lock().unwrap().clone() {
                let message = assistant_message(&format!("msg_{}", run_id), run_id, self.created_at(), &reply);
                self.messages.lock().unwrap().push(message);
            }
        }
        Ok(Run {
            id: run_id.to_string(),
            thread_id: thread_id.to_string(),
            assistant_id: "asst_test".to_string(),
            status,
            last_error,
            incomplete_details: None,
        })
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.record(format!("cancel_run:{}", run_id));
        if Self::take_failure(&self.fail_cancel) {
            return Err(Self::unavailable("/runs/cancel"));
        }
        Ok(Run {
            id: run_id.to_string(),
            thread_id: thread_id.to_string(),
            assistant_id: "asst_test".to_string(),
            status: RunStatus::Cancelling,
            last_error: None,
            incomplete_details: None,
        })
    }

    async fn list_messages(&self, _thread_id: &str) -> Result<Vec<ThreadMessage>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.record("list_messages".to_string());
        let mut messages = self.messages.lock().unwrap().clone();
        messages.reverse();
        Ok(messages)
    }
}
