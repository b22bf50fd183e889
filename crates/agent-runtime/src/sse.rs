//! Server-sent events plumbing shared by the hosted backends.

use agent_core::error::{AgentError, Result};
use agent_core::provider::{CompletionStream, StreamChunk};
use futures::StreamExt;

/// One `data:` payload, with the `event:` name that preceded it (if any)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE line decoder.
///
/// Bytes arrive in arbitrary slices; lines (and UTF-8 sequences) may be
/// split across them.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    line_buffer: String,
    current_event: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every event completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(bytes);
        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // Incomplete sequence at the end: wait for the rest
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let text = String::from_utf8_lossy(&self.pending[..valid_up_to]).into_owned();
        self.pending.drain(..valid_up_to);
        self.line_buffer.push_str(&text);

        let mut events = Vec::new();
        while let Some(newline) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=newline).collect();
            if let Some(event) = self.feed_line(line.trim_end_matches(['\n', '\r'])) {
                events.push(event);
            }
        }
        events
    }

    fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() || line.starts_with(':') {
            return None;
        }
        if let Some(name) = line.strip_prefix("event:") {
            self.current_event = Some(name.trim().to_owned());
            return None;
        }
        if let Some(data) = line.strip_prefix("data:") {
            return Some(SseEvent {
                event: self.current_event.take(),
                data: data.trim_start().to_owned(),
            });
        }
        tracing::trace!(line, "ignoring unrecognised SSE line");
        None
    }
}

/// Adapt an SSE response body into a chunk stream using a per-event decoder
pub(crate) fn sse_stream<F>(response: reqwest::Response, mut decode: F) -> CompletionStream
where
    F: FnMut(&SseEvent) -> Result<Vec<StreamChunk>> + Send + 'static,
{
    let mut decoder = SseDecoder::new();
    let stream = response.bytes_stream().flat_map(move |bytes| {
        let mut items: Vec<Result<StreamChunk>> = Vec::new();
        match bytes {
            Ok(bytes) => {
                for event in decoder.push(&bytes) {
                    match decode(&event) {
                        Ok(chunks) => items.extend(chunks.into_iter().map(Ok)),
                        Err(e) => items.push(Err(e)),
                    }
                }
            }
            Err(e) => items.push(Err(AgentError::Provider(format!("stream read error: {e}")))),
        }
        futures::stream::iter(items)
    });
    Box::pin(stream)
}

/// Map a non-success HTTP status to the matching error variant
pub(crate) async fn ensure_success(
    backend: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = format!("{backend} returned {status}: {}", truncate(&body, 300));
    tracing::warn!(backend, %status, "backend request failed");

    Err(match status.as_u16() {
        401 | 403 => AgentError::Auth(detail),
        429 => AgentError::RateLimited(detail),
        500..=599 => AgentError::ProviderUnavailable(detail),
        _ => AgentError::Provider(detail),
    })
}

pub(crate) fn request_error(backend: &str, error: &reqwest::Error) -> AgentError {
    if error.is_connect() || error.is_timeout() {
        AgentError::ProviderUnavailable(format!("{backend}: {error}"))
    } else {
        AgentError::Provider(format!("{backend}: {error}"))
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(i, _)| &text[..i])
}
