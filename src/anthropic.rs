use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{MAX_TOKENS, MODEL, RelayConfig, TEMPERATURE};
use crate::error::RelayError;
use crate::prompt::SYSTEM_PROMPT;
use crate::sse::SseParser;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageParam {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: &'a [MessageParam],
    stream: bool,
}

/// Events on the Messages API stream. Only `content_block_delta` carries
/// relay-visible text; the rest are bookkeeping.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiEvent {
    MessageStart {},
    Ping {},
    ContentBlockStart {},
    ContentBlockDelta { delta: Delta },
    ContentBlockStop {},
    MessageDelta {},
    MessageStop {},
    Error { error: ApiError },
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// A lazy, finite, non-restartable sequence of generated text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, RelayError>> + Send>>;

/// Messages API client. Constructed once at startup from [`RelayConfig`]
/// and injected into the request handler.
pub struct Anthropic {
    client: reqwest::Client,
    base_url: String,
    config: RelayConfig,
}

impl Anthropic {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            config,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Opens a streamed completion for `messages` under the fixed CopyWriter
    /// system prompt. Fails before any fragment is produced if the key is
    /// missing or the API rejects the request.
    pub async fn stream_message(
        &self,
        messages: &[MessageParam],
    ) -> Result<FragmentStream, RelayError> {
        if self.config.api_key.is_empty() {
            return Err(RelayError::MissingApiKey);
        }

        let request = MessageRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            system: SYSTEM_PROMPT,
            messages,
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Api { status, body });
        }

        Ok(Box::pin(fragments(response)))
    }
}

/// Decodes the SSE body of a streaming response into text fragments.
/// Ends cleanly on `message_stop`; an `error` event or transport failure
/// ends the stream with an error.
fn fragments(response: reqwest::Response) -> impl Stream<Item = Result<String, RelayError>> {
    async_stream::try_stream! {
        let mut parser = SseParser::new();
        let mut body = response.bytes_stream();

        'outer: while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for data in parser.push(&String::from_utf8_lossy(&chunk)) {
                let event = match serde_json::from_str::<ApiEvent>(&data) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!("skipping unrecognized stream event: {err}");
                        continue;
                    }
                };

                match event {
                    ApiEvent::ContentBlockDelta { delta } => {
                        if delta.kind == "text_delta" {
                            if let Some(text) = delta.text {
                                yield text;
                            }
                        }
                    }
                    ApiEvent::Error { error } => {
                        Err(RelayError::Stream(error.message))?;
                    }
                    ApiEvent::MessageStop {} => break 'outer,
                    _ => {}
                }
            }
        }
    }
}
