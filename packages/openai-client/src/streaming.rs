//! SSE streaming parser for OpenAI chat completions.
//!
//! Converts a raw `reqwest` byte stream into delta events and offers a
//! convenience collector that concatenates all deltas into the final text.
//! Handles `data: [DONE]`, partial lines, and buffering.

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::OpenAIError;

/// A single event from a streaming chat completion.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    /// The text delta carried by this event (may be empty).
    pub delta: String,
    /// Whether the stream signalled completion.
    pub done: bool,
}

#[derive(Debug, serde::Deserialize)]
struct RawChunk {
    #[serde(default)]
    choices: Vec<RawChoice>,
}

#[derive(Debug, serde::Deserialize)]
struct RawChoice {
    delta: RawDelta,
}

#[derive(Debug, serde::Deserialize)]
struct RawDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Stream adapter turning raw SSE bytes into [`StreamEvent`] values.
pub struct ChatCompletionStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: String,
}

impl ChatCompletionStream {
    pub(crate) fn new(
        byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: String::new(),
        }
    }

    /// Drain the stream and concatenate every delta into the full response
    /// text. Individual malformed chunks are skipped with a warning; transport
    /// errors abort the collection.
    pub async fn collect_content(mut self) -> Result<String, OpenAIError> {
        let mut content = String::new();
        while let Some(event) = self.next().await {
            match event {
                Ok(ev) => {
                    if ev.done {
                        break;
                    }
                    content.push_str(&ev.delta);
                }
                Err(OpenAIError::Parse(msg)) => {
                    tracing::warn!(error = %msg, "skipping malformed stream chunk");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(content)
    }
}

impl Stream for ChatCompletionStream {
    type Item = Result<StreamEvent, OpenAIError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = next_event(&mut this.buffer) {
                return Poll::Ready(Some(event));
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => this.buffer.push_str(text),
                    Err(e) => {
                        return Poll::Ready(Some(Err(OpenAIError::Parse(format!(
                            "Invalid UTF-8 in stream: {}",
                            e
                        )))));
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(OpenAIError::Network(e.to_string()))));
                }
                Poll::Ready(None) => {
                    // Stream ended; a trailing unterminated line may remain.
                    if this.buffer.trim().is_empty() {
                        return Poll::Ready(None);
                    }
                    this.buffer.push('\n');
                    if let Some(event) = next_event(&mut this.buffer) {
                        return Poll::Ready(Some(event));
                    }
                    this.buffer.clear();
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Pop complete lines off the buffer until one yields an event.
/// Returns `None` when no complete line is buffered yet.
fn next_event(buffer: &mut String) -> Option<Result<StreamEvent, OpenAIError>> {
    loop {
        let newline_pos = buffer.find('\n')?;
        let line = buffer[..newline_pos].trim().to_string();
        buffer.drain(..=newline_pos);

        // SSE uses blank lines as event separators.
        if line.is_empty() {
            continue;
        }

        let Some(data) = line.strip_prefix("data: ") else {
            // Ignore "event:", "id:", "retry:" lines.
            continue;
        };
        let data = data.trim();

        if data == "[DONE]" {
            return Some(Ok(StreamEvent {
                delta: String::new(),
                done: true,
            }));
        }

        match serde_json::from_str::<RawChunk>(data) {
            Ok(raw) => {
                let delta = raw
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                    .unwrap_or_default();

                return Some(Ok(StreamEvent { delta, done: false }));
            }
            Err(e) => {
                return Some(Err(OpenAIError::Parse(format!(
                    "Failed to parse stream chunk: {} (data: {})",
                    e,
                    crate::types::truncate_to_char_boundary(data, 200)
                ))));
            }
        }
    }
}
