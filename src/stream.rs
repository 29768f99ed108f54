//! Incremental decoding of vendor streaming bodies.
//!
//! Vendors frame their token-by-token output either as Server-Sent Events
//! (`data:` lines separated by blank lines, optionally terminated by `[DONE]`)
//! or as newline-delimited JSON objects. [`FrameDecoder`] turns a raw body
//! stream into [`StreamEvent`] values for both framings, and [`text_stream`]
//! narrows those events down to the text fragments a caller actually reads.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::{StreamExt, future};
use tracing::trace;

use crate::error::LLMError;
use crate::http::HttpBodyStream;

/// Lazy, finite sequence of answer fragments.
///
/// The sequence ends at the vendor's `[DONE]` sentinel or at body EOF. It is
/// not restartable; asking the provider again re-issues the HTTP request.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LLMError>> + Send>>;

/// Wire framing of a streaming body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Server-Sent Events: `data:` lines, events separated by a blank line.
    ServerSentEvents,
    /// One JSON document per line.
    JsonLines,
}

/// Standardized event yielded by [`FrameDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Raw payload of one frame.
    Data(String),
    /// Terminal marker reported via `[DONE]`.
    Done,
}

/// Normalizes vendor streaming bodies into [`StreamEvent`] values.
pub struct FrameDecoder {
    body: HttpBodyStream,
    framing: Framing,
    buffer: Vec<u8>,
    data_lines: Vec<Vec<u8>>,
    pending: VecDeque<Result<StreamEvent, LLMError>>,
    vendor: &'static str,
    stream_closed: bool,
    done_received: bool,
}

impl FrameDecoder {
    /// Wraps a raw HTTP body stream and prepares it for decoding.
    pub fn new(body: HttpBodyStream, framing: Framing, vendor: &'static str) -> Self {
        Self {
            body,
            framing,
            buffer: Vec::new(),
            data_lines: Vec::new(),
            pending: VecDeque::new(),
            vendor,
            stream_closed: false,
            done_received: false,
        }
    }

    fn handle_line(&mut self, line: Vec<u8>) {
        match self.framing {
            Framing::ServerSentEvents => {
                if line.starts_with(b"data:") {
                    let mut data = line[5..].to_vec();
                    if data.first() == Some(&b' ') {
                        data.remove(0);
                    }
                    self.data_lines.push(data);
                }
            }
            Framing::JsonLines => {
                if !line.iter().all(u8::is_ascii_whitespace) {
                    self.data_lines.push(line);
                    self.flush_event();
                }
            }
        }
    }

    fn flush_event(&mut self) {
        if self.data_lines.is_empty() {
            return;
        }

        let mut joined = Vec::new();
        for (idx, mut segment) in self.data_lines.drain(..).enumerate() {
            if idx > 0 {
                joined.push(b'\n');
            }
            joined.append(&mut segment);
        }

        if joined.is_empty() {
            return;
        }

        let data = match String::from_utf8(joined) {
            Ok(data) => data,
            Err(err) => {
                trace!(vendor = self.vendor, error = %err, "skipping non UTF-8 stream frame");
                return;
            }
        };

        if self.framing == Framing::ServerSentEvents && data.trim() == "[DONE]" {
            if !self.done_received {
                self.done_received = true;
                self.pending.push_back(Ok(StreamEvent::Done));
            }
        } else {
            self.pending.push_back(Ok(StreamEvent::Data(data)));
        }
    }

    fn drain_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
        buffer.iter().position(|b| *b == b'\n').map(|pos| {
            let mut line: Vec<u8> = buffer.drain(..=pos).collect();
            if line.last() == Some(&b'\n') {
                line.pop();
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            line
        })
    }
}

impl Stream for FrameDecoder {
    type Item = Result<StreamEvent, LLMError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(event) = this.pending.pop_front() {
            return Poll::Ready(Some(event));
        }

        if this.done_received || this.stream_closed {
            return Poll::Ready(None);
        }

        loop {
            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.extend_from_slice(&bytes);
                    while let Some(line) = Self::drain_line(&mut this.buffer) {
                        if line.is_empty() {
                            this.flush_event();
                        } else {
                            this.handle_line(line);
                        }
                        if this.done_received {
                            break;
                        }
                    }
                    if let Some(event) = this.pending.pop_front() {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    this.stream_closed = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    this.stream_closed = true;
                    if !this.buffer.is_empty() {
                        let line = this.buffer.drain(..).collect::<Vec<u8>>();
                        this.handle_line(line);
                    }
                    this.flush_event();
                    return Poll::Ready(this.pending.pop_front());
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Extracts the text fragment carried by one decoded frame.
///
/// `Ok(None)` means the frame is well-formed but carries no text (role
/// announcements, usage blocks, ping events). `Err` marks a malformed frame,
/// which the stream skips.
pub(crate) type FragmentExtractor = fn(&str) -> Result<Option<String>, serde_json::Error>;

/// Turns a vendor body into a [`TextStream`] of non-empty fragments.
///
/// Malformed frames are skipped; a body read failure ends the stream with a
/// vendor-qualified error.
pub(crate) fn text_stream(
    body: HttpBodyStream,
    framing: Framing,
    vendor: &'static str,
    extract: FragmentExtractor,
) -> TextStream {
    let decoder = FrameDecoder::new(body, framing, vendor);
    Box::pin(decoder.filter_map(move |event| {
        let item = match event {
            Ok(StreamEvent::Data(data)) => match extract(&data) {
                Ok(Some(text)) if !text.is_empty() => Some(Ok(text)),
                Ok(_) => None,
                Err(err) => {
                    trace!(vendor, error = %err, "skipping malformed stream fragment");
                    None
                }
            },
            Ok(StreamEvent::Done) => None,
            Err(err) => Some(Err(err.qualify(vendor))),
        };
        future::ready(item)
    }))
}

/// Drains a [`TextStream`] and concatenates every fragment.
pub async fn collect_text(mut stream: TextStream) -> Result<String, LLMError> {
    let mut text = String::new();
    while let Some(fragment) = stream.next().await {
        text.push_str(&fragment?);
    }
    Ok(text)
}

/// Reads a whole body, used to surface error payloads of failed stream calls.
pub(crate) async fn collect_body_text(
    mut body: HttpBodyStream,
    vendor: &'static str,
) -> Result<String, LLMError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        bytes.extend_from_slice(&chunk.map_err(|err| err.qualify(vendor))?);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use futures_util::stream;
    use serde_json::Value;

    use super::*;

    fn build_body(chunks: Vec<Result<Vec<u8>, LLMError>>) -> HttpBodyStream {
        Box::pin(stream::iter(chunks))
    }

    fn extract_text_field(data: &str) -> Result<Option<String>, serde_json::Error> {
        let value: Value = serde_json::from_str(data)?;
        Ok(value
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    #[tokio::test]
    async fn decoder_emits_data_and_done_events() {
        let chunks = vec![
            Ok(b"data: {\"text\":\"hi\"}\n\n".to_vec()),
            Ok(b"data: [DONE]\n\n".to_vec()),
            Ok(b"data: {\"text\":\"after done\"}\n\n".to_vec()),
        ];
        let mut decoder = FrameDecoder::new(build_body(chunks), Framing::ServerSentEvents, "test");

        let first = decoder.next().await.expect("event").expect("ok");
        assert_eq!(first, StreamEvent::Data("{\"text\":\"hi\"}".to_string()));

        let second = decoder.next().await.expect("event").expect("ok");
        assert_eq!(second, StreamEvent::Done);

        assert!(decoder.next().await.is_none());
    }

    #[tokio::test]
    async fn decoder_combines_multiline_payloads_and_ignores_event_lines() {
        let chunks = vec![
            Ok(b"event: content_block_delta\n".to_vec()),
            Ok(b"data: line one\n".to_vec()),
            Ok(b"data: line two\n\n".to_vec()),
        ];
        let mut decoder = FrameDecoder::new(build_body(chunks), Framing::ServerSentEvents, "test");
        let event = decoder.next().await.expect("event").expect("ok");
        assert_eq!(event, StreamEvent::Data("line one\nline two".to_string()));
        assert!(decoder.next().await.is_none());
    }

    #[tokio::test]
    async fn decoder_splits_json_lines_across_chunk_boundaries() {
        let chunks = vec![
            Ok(b"{\"text\":\"Hel".to_vec()),
            Ok(b"lo\"}\n{\"text\":\" world\"}\n".to_vec()),
            Ok(b"{\"text\":\"!\"}".to_vec()),
        ];
        let decoder = FrameDecoder::new(build_body(chunks), Framing::JsonLines, "test");
        let events: Vec<_> = decoder.map(|event| event.expect("ok")).collect().await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Data("{\"text\":\"Hello\"}".to_string()),
                StreamEvent::Data("{\"text\":\" world\"}".to_string()),
                StreamEvent::Data("{\"text\":\"!\"}".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn decoder_skips_invalid_utf8_frames() {
        let chunks = vec![
            Ok(b"data: \xff\n\n".to_vec()),
            Ok(b"data: ok\n\n".to_vec()),
        ];
        let mut decoder = FrameDecoder::new(build_body(chunks), Framing::ServerSentEvents, "test");
        let event = decoder.next().await.expect("event").expect("ok");
        assert_eq!(event, StreamEvent::Data("ok".to_string()));
    }

    #[tokio::test]
    async fn text_stream_skips_malformed_fragments() {
        let chunks = vec![
            Ok(b"data: {\"text\":\"Hi\"}\n\n".to_vec()),
            Ok(b"data: {not json\n\n".to_vec()),
            Ok(b"data: {\"other\":1}\n\n".to_vec()),
            Ok(b"data: {\"text\":\" there\"}\n\n".to_vec()),
            Ok(b"data: [DONE]\n\n".to_vec()),
        ];
        let stream = text_stream(
            build_body(chunks),
            Framing::ServerSentEvents,
            "test",
            extract_text_field,
        );
        assert_eq!(collect_text(stream).await.expect("text"), "Hi there");
    }

    #[tokio::test]
    async fn text_stream_qualifies_body_errors() {
        let chunks = vec![
            Ok(b"data: {\"text\":\"Hi\"}\n\n".to_vec()),
            Err(LLMError::transport("connection reset")),
        ];
        let stream = text_stream(
            build_body(chunks),
            Framing::ServerSentEvents,
            "openai",
            extract_text_field,
        );
        match collect_text(stream).await {
            Err(LLMError::VendorRequest {
                vendor, message, ..
            }) => {
                assert_eq!(vendor, "openai");
                assert!(message.contains("connection reset"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
