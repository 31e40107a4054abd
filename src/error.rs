use reqwest::StatusCode;
use thiserror::Error;

/// Failures the relay can hit on the way to, or during, an upstream stream.
///
/// Everything before streaming begins collapses to a single HTTP 500 with
/// this error's message as the `details` field; anything after the headers
/// have been sent is reported in-band as an SSE error frame.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Body was not JSON or did not match the chat request schema.
    #[error("Invalid messages format")]
    InvalidInput(#[source] serde_json::Error),

    #[error("ANTHROPIC_API_KEY is not set")]
    MissingApiKey,

    /// Upstream rejected the request before any tokens were streamed.
    #[error("API error: {status} - {body}")]
    Api { status: StatusCode, body: String },

    /// Transport failure talking to the upstream API.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Failure reported after streaming had already begun.
    #[error("{0}")]
    Stream(String),
}
