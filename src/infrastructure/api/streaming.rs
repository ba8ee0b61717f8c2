//! Server-Sent Events parsing for the NudgeEngine push stream.
//!
//! The subscription endpoint answers with a long-lived `text/event-stream`
//! body. Each event carries a single JSON document in its `data:` field,
//! tagged by `type`:
//! - connected: subscription accepted, backlog replay follows
//! - nudge: a triggered nudge (backlog or live)
//! - heartbeat: keepalive
//! - error: server-side failure; the client abandons the stream

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tracing::{debug, warn};

use crate::domain::errors::ApiError;
use crate::domain::models::PushMessage;

/// Parse one SSE event block into a push message.
///
/// Returns `Ok(None)` for blocks without data (comments, bare `event:`
/// lines) and for message types this client does not know.
///
/// # Example
/// ```
/// use nudgebet::domain::models::PushMessage;
/// use nudgebet::infrastructure::api::streaming::parse_sse_event;
///
/// let event = parse_sse_event("event: message\ndata: {\"type\":\"heartbeat\"}").unwrap();
/// assert_eq!(event, Some(PushMessage::Heartbeat));
/// ```
pub fn parse_sse_event(text: &str) -> Result<Option<PushMessage>, ApiError> {
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        // Comments double as keepalives on some proxies
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    if data_lines.is_empty() {
        return Ok(None);
    }

    let data = data_lines.join("\n");
    let value: serde_json::Value = serde_json::from_str(data.trim())?;

    let Some(kind) = value.get("type").and_then(|t| t.as_str()) else {
        return Err(ApiError::Stream("SSE data missing 'type' field".to_string()));
    };

    if !PushMessage::KNOWN_TYPES.contains(&kind) {
        debug!(kind, "ignoring unknown push message type");
        return Ok(None);
    }

    Ok(Some(serde_json::from_value(value)?))
}

/// Wraps a response byte stream and yields parsed push messages.
pub struct SseEventStream {
    inner: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: Vec<u8>,
    /// Set once the body has ended; the inner stream is never polled again
    done: bool,
}

impl SseEventStream {
    /// Create a new SSE stream from `reqwest::Response::bytes_stream()`
    pub fn new(byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: Vec::new(),
            done: false,
        }
    }

    /// Split the next complete event block off the buffer.
    fn take_block(&mut self) -> Option<String> {
        let end = self.buffer.windows(2).position(|w| w == b"\n\n")?;
        let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
        Some(String::from_utf8_lossy(&block[..end]).into_owned())
    }
}

impl Stream for SseEventStream {
    type Item = Result<PushMessage, ApiError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        loop {
            if let Some(block) = self.take_block() {
                match parse_sse_event(&block) {
                    Ok(Some(message)) => return Poll::Ready(Some(Ok(message))),
                    Ok(None) => continue,
                    Err(e) => return Poll::Ready(Some(Err(e))),
                }
            }

            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    // Normalise CRLF framing to LF
                    self.buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(ApiError::Stream(e.without_url().to_string()))));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    if self.buffer.iter().all(u8::is_ascii_whitespace) {
                        return Poll::Ready(None);
                    }
                    let remaining = String::from_utf8_lossy(&self.buffer).into_owned();
                    self.buffer.clear();
                    match parse_sse_event(&remaining) {
                        Ok(Some(message)) => return Poll::Ready(Some(Ok(message))),
                        Ok(None) => return Poll::Ready(None),
                        Err(e) => {
                            warn!("stream ended with unparsable data: {}", e);
                            return Poll::Ready(Some(Err(e)));
                        }
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
