use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::anthropic::{MessageParam, Role};

/// Sentinel content value that marks a successfully completed stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Body of `POST /api/chat`. Anything that does not deserialize into this
/// shape is rejected as invalid input.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<IncomingMessage>,
}

/// One raw conversation entry as supplied by the caller. Both fields are
/// optional so that sparse entries survive parsing and get dropped or
/// coerced during normalization instead of failing the whole request.
#[derive(Debug, Default, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Filters and coerces raw entries into the form sent upstream: content is
/// trimmed and must be non-empty, and any role other than `user` becomes
/// `assistant`.
pub fn normalize(messages: Vec<IncomingMessage>) -> Vec<MessageParam> {
    messages
        .into_iter()
        .filter_map(|message| {
            let content = message.content?;
            let content = content.trim();
            if content.is_empty() {
                return None;
            }
            let role = match message.role.as_deref() {
                Some("user") => Role::User,
                _ => Role::Assistant,
            };
            Some(MessageParam {
                role,
                content: content.to_string(),
            })
        })
        .collect()
}

/// One event on the relay's SSE channel.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Content(String),
    Done,
    Error(String),
}

impl StreamEvent {
    /// Encodes the event as one SSE frame: `data: <json>\n\n`.
    pub fn to_frame(&self) -> Bytes {
        let payload = match self {
            StreamEvent::Content(text) => json!({ "content": text }),
            StreamEvent::Done => json!({ "content": DONE_MARKER }),
            StreamEvent::Error(message) => json!({ "error": message }),
        };
        Bytes::from(format!("data: {}\n\n", payload))
    }

    /// Decodes the data payload of one frame. Returns `None` for payloads
    /// that are not relay events.
    pub fn parse(data: &str) -> Option<StreamEvent> {
        #[derive(Deserialize)]
        struct Frame {
            #[serde(default)]
            content: Option<String>,
            #[serde(default)]
            error: Option<String>,
        }

        let frame: Frame = serde_json::from_str(data).ok()?;
        if let Some(message) = frame.error {
            return Some(StreamEvent::Error(message));
        }
        let content = frame.content?;
        if content == DONE_MARKER {
            Some(StreamEvent::Done)
        } else {
            Some(StreamEvent::Content(content))
        }
    }
}

/// Serialized for the relay request body sent by the terminal client.
#[derive(Debug, Serialize)]
pub struct ChatRequestBody<'a> {
    pub messages: &'a [MessageParam],
}
