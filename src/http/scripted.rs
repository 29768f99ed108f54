//! In-memory transport that replays canned responses.
//!
//! Useful for exercising request pipelines without a network: every request
//! is recorded, and responses are served in the order they were queued.
//! Compiled for this crate's own tests and behind the `test-util` feature.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::error::LLMError;

use super::{HttpBodyStream, HttpRequest, HttpResponse, HttpStreamResponse, HttpTransport};

enum Scripted {
    Body { status: u16, body: Vec<u8> },
    Chunks { status: u16, chunks: Vec<Result<Vec<u8>, LLMError>> },
    Fail(LLMError),
}

/// Replays queued responses and records every request it receives.
///
/// Queued bodies answer both `send` and `send_stream`; a body served through
/// `send_stream` arrives as one chunk, queued chunks served through `send`
/// are concatenated.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response whose body is `body` serialized as JSON.
    pub fn push_json(&self, status: u16, body: serde_json::Value) -> &Self {
        self.push(Scripted::Body {
            status,
            body: body.to_string().into_bytes(),
        })
    }

    /// Queues a response with a raw text body.
    pub fn push_text(&self, status: u16, body: impl Into<String>) -> &Self {
        self.push(Scripted::Body {
            status,
            body: body.into().into_bytes(),
        })
    }

    /// Queues a streaming response delivered chunk by chunk.
    pub fn push_chunks<I, S>(&self, status: u16, chunks: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Scripted::Chunks {
            status,
            chunks: chunks
                .into_iter()
                .map(|chunk| Ok(chunk.into().into_bytes()))
                .collect(),
        })
    }

    /// Queues a streaming response that fails after the given chunks.
    pub fn push_broken_stream<I, S>(&self, chunks: I, error: LLMError) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut chunks: Vec<_> = chunks
            .into_iter()
            .map(|chunk| Ok(chunk.into().into_bytes()))
            .collect();
        chunks.push(Err(error));
        self.push(Scripted::Chunks {
            status: 200,
            chunks,
        })
    }

    /// Queues a transport-level failure such as a timeout.
    pub fn push_error(&self, error: LLMError) -> &Self {
        self.push(Scripted::Fail(error))
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Decoded JSON body of the most recent request.
    pub fn last_json_body(&self) -> Option<serde_json::Value> {
        self.requests()
            .last()
            .and_then(|request| request.json_body().ok())
    }

    fn push(&self, entry: Scripted) -> &Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(entry);
        }
        self
    }

    fn next(&self, request: HttpRequest) -> Result<Scripted, LLMError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .ok_or_else(|| LLMError::transport("no scripted response left"))
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError> {
        let (status, body) = match self.next(request)? {
            Scripted::Body { status, body } => (status, body),
            Scripted::Chunks { status, chunks } => {
                let mut body = Vec::new();
                for chunk in chunks {
                    body.extend(chunk?);
                }
                (status, body)
            }
            Scripted::Fail(error) => return Err(error),
        };
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body,
        })
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, LLMError> {
        let (status, chunks) = match self.next(request)? {
            Scripted::Body { status, body } => (status, vec![Ok(body)]),
            Scripted::Chunks { status, chunks } => (status, chunks),
            Scripted::Fail(error) => return Err(error),
        };
        let body: HttpBodyStream = Box::pin(stream::iter(chunks));
        Ok(HttpStreamResponse {
            status,
            headers: HashMap::new(),
            body,
        })
    }
}
