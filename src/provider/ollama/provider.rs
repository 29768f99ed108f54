use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LLMError;
use crate::http::DynHttpTransport;
use crate::provider::{Endpoint, LLMProvider, join_url};
use crate::stream::{Framing, TextStream};
use crate::types::{
    CapabilityDescriptor, Generation, GenerationRequest, OllamaMetadata, ResponseMetadata,
};

use super::request::build_ollama_body;
use super::types::OllamaChatResponse;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3";
const VENDOR: &str = "ollama";

/// Driver for a local or remote Ollama server. No authentication.
pub struct OllamaProvider {
    transport: DynHttpTransport,
    base_url: String,
    default_model: String,
    timeout: Duration,
}

impl OllamaProvider {
    pub fn new(transport: DynHttpTransport) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint {
            transport: self.transport.clone(),
            vendor: VENDOR,
            url: join_url(&self.base_url, "api/chat"),
            headers: HashMap::new(),
            timeout: self.timeout,
        }
    }
}

fn extract_fragment(data: &str) -> Result<Option<String>, serde_json::Error> {
    let chunk: OllamaChatResponse = serde_json::from_str(data)?;
    Ok(chunk.message.and_then(|message| message.content))
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn complete(&self, request: &GenerationRequest) -> Result<Generation, LLMError> {
        let body = build_ollama_body(request, &request.resolve_model(&self.default_model), false);
        let raw = self.endpoint().send(&body).await?;
        let text = raw
            .pointer("/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Generation::new(text, raw))
    }

    async fn generate_stream_response(
        &self,
        request: &GenerationRequest,
    ) -> Result<TextStream, LLMError> {
        let body = build_ollama_body(request, &request.resolve_model(&self.default_model), true);
        self.endpoint()
            .open_stream(&body, Framing::JsonLines, extract_fragment)
            .await
    }

    fn response_metadata(&self, generation: &Generation) -> Option<ResponseMetadata> {
        let raw = generation.raw.as_ref()?;
        let parsed: OllamaChatResponse = serde_json::from_value(raw.clone()).ok()?;
        let thinking = parsed.message.and_then(|message| message.thinking);
        Some(ResponseMetadata::Ollama(OllamaMetadata {
            model: parsed.model,
            created_at: parsed.created_at,
            done: parsed.done,
            done_reason: parsed.done_reason,
            total_duration: parsed.total_duration,
            load_duration: parsed.load_duration,
            prompt_eval_count: parsed.prompt_eval_count,
            prompt_eval_duration: parsed.prompt_eval_duration,
            eval_count: parsed.eval_count,
            eval_duration: parsed.eval_duration,
            thinking,
            raw: raw.clone(),
        }))
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            supports_native_stream: true,
            supports_structured_output: true,
            reports_usage: false,
        }
    }

    fn name(&self) -> &'static str {
        VENDOR
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}
