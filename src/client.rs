use std::error::Error;
use std::future::Future;

use futures::StreamExt;
use reqwest::Client as HttpClient;

use crate::anthropic::MessageParam;
use crate::protocol::{ChatRequestBody, StreamEvent};
use crate::sse::SseParser;

pub struct ClientConfig {
    pub base_url: String,
}

/// HTTP side of the terminal client: posts the running conversation to the
/// relay and decodes the SSE reply.
pub struct ChatClient {
    base_url: String,
    http: HttpClient,
}

type ClientResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

impl ChatClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            base_url: normalize_base_url(&config.base_url),
            http: HttpClient::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends `conversation` and invokes `on_event` for every relay event
    /// until the done marker or an error frame closes the stream.
    pub async fn stream_chat<F, Fut>(
        &self,
        conversation: &[MessageParam],
        mut on_event: F,
    ) -> ClientResult<()>
    where
        F: FnMut(StreamEvent) -> Fut,
        Fut: Future<Output = ()>,
    {
        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&ChatRequestBody {
                messages: conversation,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Relay error: {} - {}", status, relay_details(&body)).into());
        }

        let mut stream = response.bytes_stream();
        let mut parser = SseParser::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for data in parser.push(&String::from_utf8_lossy(&chunk)) {
                if let Some(event) = StreamEvent::parse(&data) {
                    let closes_stream =
                        matches!(event, StreamEvent::Done | StreamEvent::Error(_));
                    on_event(event).await;
                    if closes_stream {
                        return Ok(());
                    }
                }
            }
        }

        Ok(())
    }
}

/// Pulls the `details` field out of the relay's JSON error body, falling
/// back to the raw body.
fn relay_details(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("details")
                .and_then(|details| details.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

fn normalize_base_url(value: &str) -> String {
    value.trim_end_matches('/').to_string()
}
