//! Relays chat messages to a hosted assistant thread and returns its replies.
//!
//! A turn goes: [`session`] (ensure assistant + thread) → [`relay`] (post the
//! message, start a run) → [`poller`] (wait for a terminal status) →
//! [`extractor`] (pick the run's reply). [`chat::ChatService`] strings these
//! together and [`web_server`] exposes it as `POST /send-message`.

pub mod assistant_api;
pub mod chat;
pub mod config;
pub mod error;
pub mod extractor;
pub mod poller;
pub mod relay;
pub mod session;
pub mod web_server;

pub use chat::ChatService;
pub use error::{ApiError, RelayError};
