use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    serve, Json, Router,
};
use minijinja::Environment;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::chat::ChatService;
use crate::error::RelayError;

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

const GENERIC_FAILURE: &str = "Failed to process message";
const INVALID_BODY: &str = "Invalid request body";
const EMPTY_MESSAGE: &str = "Message must not be empty";

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SendMessageResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

// Shared application state
#[derive(Clone)]
pub struct AppState {
    chat: Arc<ChatService>,
    templates: Arc<Environment<'static>>,
    assistant_name: Arc<str>,
}

impl AppState {
    pub fn new(chat: Arc<ChatService>, assistant_name: &str) -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("index.html", INDEX_TEMPLATE)
            .context("Failed to load index template")?;
        Ok(Self {
            chat,
            templates: Arc::new(env),
            assistant_name: Arc::from(assistant_name),
        })
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

async fn index_handler(State(state): State<AppState>) -> Response {
    let rendered = state.templates.get_template("index.html").and_then(|tmpl| {
        tmpl.render(minijinja::context! {
            title => "Assistant Chat",
            assistant_name => &*state.assistant_name,
        })
    });
    match rendered {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Failed to render index template: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `POST /send-message`: one chat turn.
///
/// `200 {"response"}` on success and `500 {"error"}` for every failure of the
/// turn, logged here in full and answered with a generic payload. Requests
/// rejected before any remote call (a body that is not `{"message": string}`,
/// or blank text) get `400 {"error"}` instead of `500`.
async fn send_message_handler(
    State(state): State<AppState>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("Rejected send-message body: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, INVALID_BODY);
        }
    };

    // The turn runs detached so a client hanging up does not cancel a run
    // that is already underway.
    let chat = state.chat.clone();
    let turn = tokio::spawn(async move { chat.send(&request.message).await });
    let outcome = match turn.await {
        Ok(outcome) => outcome,
        Err(e) => Err(RelayError::TurnAborted(e.to_string())),
    };

    match outcome {
        Ok(response) => Json(SendMessageResponse { response }).into_response(),
        Err(RelayError::EmptyMessage) => error_response(StatusCode::BAD_REQUEST, EMPTY_MESSAGE),
        Err(e) => {
            error!(error = ?e, "Error in assistant API call: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE)
        }
    }
}

/// Builds the application router: the chat page, its assets, and the relay
/// endpoint.
pub fn router(state: AppState, static_dir: impl Into<PathBuf>) -> Router {
    let static_files_service = ServeDir::new(static_dir.into());

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/send-message", post(send_message_handler))
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http()) // Request logging
                .layer(CorsLayer::permissive()),
        )
}

pub async fn start_web_server(port: u16, state: AppState, static_dir: PathBuf) -> Result<()> {
    let app = router(state, static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}
