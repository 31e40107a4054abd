use std::convert::Infallible;
use std::error::Error;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use futures::StreamExt;
use serde_json::json;
use tracing::{error, info};

use crate::anthropic::{Anthropic, FragmentStream};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::protocol::{ChatRequest, normalize};
use crate::sse::relay_frames;

pub struct ServerConfig {
    pub listen: String,
}

#[derive(Clone)]
pub struct AppState {
    anthropic: Arc<Anthropic>,
}

impl AppState {
    pub fn new(anthropic: Anthropic) -> Self {
        Self {
            anthropic: Arc::new(anthropic),
        }
    }
}

type ServerResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .with_state(state)
}

pub async fn run(config: ServerConfig, relay: RelayConfig) -> ServerResult<()> {
    let app = router(AppState::new(Anthropic::new(relay)));

    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!(addr = %config.listen, "copydesk relay listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// The relay route: validate, normalize, open the upstream stream, and
/// republish it as SSE. Every failure before the first frame collapses to
/// one HTTP 500 shape.
async fn chat(State(state): State<AppState>, body: String) -> Response {
    match open_stream(&state, &body).await {
        Ok(fragments) => sse_response(fragments),
        Err(err) => {
            error!("chat request failed: {err}");
            error_response(&err)
        }
    }
}

async fn open_stream(state: &AppState, body: &str) -> Result<FragmentStream, RelayError> {
    let request: ChatRequest = serde_json::from_str(body).map_err(RelayError::InvalidInput)?;
    let messages = normalize(request.messages);
    state.anthropic.stream_message(&messages).await
}

fn sse_response(fragments: FragmentStream) -> Response {
    let frames = relay_frames(fragments).map(Ok::<_, Infallible>);
    // Dropping this body on client disconnect drops the upstream response,
    // which aborts the in-flight API request.
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}

fn error_response(err: &RelayError) -> Response {
    let body = json!({
        "error": "Error processing your request",
        "details": err.to_string(),
    });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
}
