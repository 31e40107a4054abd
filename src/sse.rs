use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::error;

use crate::error::RelayError;
use crate::protocol::StreamEvent;

/// Incremental decoder for an SSE byte stream. Transport chunks can split
/// events anywhere, so input is buffered until a blank-line terminator
/// completes an event.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one transport chunk and returns the data payloads of any
    /// events it completed, in order.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        if chunk.contains('\r') {
            self.buffer.push_str(&chunk.replace("\r\n", "\n"));
        } else {
            self.buffer.push_str(chunk);
        }

        let mut payloads = Vec::new();
        while let Some(idx) = self.buffer.find("\n\n") {
            let raw_event = self.buffer[..idx].to_string();
            self.buffer = self.buffer[idx + 2..].to_string();

            if let Some(data) = extract_data(&raw_event) {
                payloads.push(data);
            }
        }
        payloads
    }
}

fn extract_data(raw: &str) -> Option<String> {
    let mut data_lines = Vec::new();
    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(data) = line.strip_prefix("data:") {
            data_lines.push(data.trim_start().to_string());
        }
    }

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

/// Re-frames a fragment stream as the relay's SSE byte stream.
///
/// Fragments pass through in arrival order, one frame each. A clean end of
/// input appends the done marker; the first error appends one error frame
/// and ends the stream with no done marker.
pub fn relay_frames<S>(fragments: S) -> impl Stream<Item = Bytes> + Send
where
    S: Stream<Item = Result<String, RelayError>> + Send + 'static,
{
    async_stream::stream! {
        futures::pin_mut!(fragments);
        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(text) => yield StreamEvent::Content(text).to_frame(),
                Err(err) => {
                    error!("streaming error: {err}");
                    yield StreamEvent::Error(err.to_string()).to_frame();
                    return;
                }
            }
        }
        yield StreamEvent::Done.to_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn parser_handles_events_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push("data: {\"con").is_empty());
        let payloads = parser.push("tent\":\"hi\"}\n\ndata: second\n\n");
        assert_eq!(payloads, vec!["{\"content\":\"hi\"}", "second"]);
    }

    #[test]
    fn parser_normalizes_crlf_and_joins_data_lines() {
        let mut parser = SseParser::new();
        let payloads = parser.push("event: delta\r\ndata: one\r\ndata: two\r\n\r\n");
        assert_eq!(payloads, vec!["one\ntwo"]);
    }

    #[test]
    fn parser_skips_events_without_data() {
        let mut parser = SseParser::new();
        assert!(parser.push(": comment\n\n").is_empty());
    }

    #[tokio::test]
    async fn frames_end_with_done_marker() {
        let fragments = stream::iter(vec![
            Ok("Hello".to_string()),
            Ok(" world".to_string()),
        ]);

        let frames: Vec<Bytes> = relay_frames(fragments).collect().await;
        assert_eq!(
            frames,
            vec![
                Bytes::from("data: {\"content\":\"Hello\"}\n\n"),
                Bytes::from("data: {\"content\":\" world\"}\n\n"),
                Bytes::from("data: {\"content\":\"[DONE]\"}\n\n"),
            ]
        );
    }

    #[tokio::test]
    async fn error_replaces_done_marker_and_ends_stream() {
        let fragments = stream::iter(vec![
            Ok("partial".to_string()),
            Err(RelayError::Stream("upstream died".to_string())),
            Ok("never sent".to_string()),
        ]);

        let frames: Vec<Bytes> = relay_frames(fragments).collect().await;
        assert_eq!(
            frames,
            vec![
                Bytes::from("data: {\"content\":\"partial\"}\n\n"),
                Bytes::from("data: {\"error\":\"upstream died\"}\n\n"),
            ]
        );
    }

    #[tokio::test]
    async fn empty_input_yields_only_done_marker() {
        let fragments = stream::iter(Vec::<Result<String, RelayError>>::new());
        let frames: Vec<Bytes> = relay_frames(fragments).collect().await;
        assert_eq!(frames, vec![Bytes::from("data: {\"content\":\"[DONE]\"}\n\n")]);
    }
}
