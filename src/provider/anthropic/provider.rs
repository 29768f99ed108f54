use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::LLMError;
use crate::http::DynHttpTransport;
use crate::provider::{Endpoint, LLMProvider, join_url};
use crate::stream::{Framing, TextStream};
use crate::types::{
    AnthropicMetadata, CapabilityDescriptor, Generation, GenerationRequest, ResponseMetadata,
    Usage,
};

use super::request::build_anthropic_body;
use super::types::{AnthropicContentBlock, AnthropicMessageResponse, AnthropicStreamEvent};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-opus-20240229";
const API_VERSION: &str = "2023-06-01";
const VENDOR: &str = "anthropic";

/// Anthropic Messages driver. Authenticates with `x-api-key`.
pub struct AnthropicProvider {
    transport: DynHttpTransport,
    api_key: String,
    base_url: String,
    default_model: String,
    timeout: Duration,
}

impl AnthropicProvider {
    pub fn new(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            api_key: api_key.into(),
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
        let base = self.base_url.trim_end_matches('/');
        let path = if base.ends_with("/v1") {
            "messages"
        } else {
            "v1/messages"
        };
        Endpoint {
            transport: self.transport.clone(),
            vendor: VENDOR,
            url: join_url(base, path),
            headers: HashMap::from([
                ("x-api-key".to_string(), self.api_key.clone()),
                ("anthropic-version".to_string(), API_VERSION.to_string()),
            ]),
            timeout: self.timeout,
        }
    }

    fn decode(generation: &Generation) -> Option<AnthropicMessageResponse> {
        serde_json::from_value(generation.raw.clone()?).ok()
    }
}

fn extract_fragment(data: &str) -> Result<Option<String>, serde_json::Error> {
    let event: AnthropicStreamEvent = serde_json::from_str(data)?;
    Ok(event
        .delta
        .and_then(|delta| delta.text)
        .or_else(|| event.content_block.and_then(|block| block.text)))
}

fn answer_text(blocks: &[AnthropicContentBlock]) -> String {
    blocks
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect()
}

fn thinking_text(blocks: &[AnthropicContentBlock]) -> Option<String> {
    let parts: Vec<&str> = blocks
        .iter()
        .filter(|block| block.kind == "thinking")
        .filter_map(|block| block.thinking.as_deref())
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n"))
}

fn tool_calls(blocks: &[AnthropicContentBlock]) -> Option<Value> {
    let calls: Vec<Value> = blocks
        .iter()
        .filter(|block| block.kind == "tool_use")
        .map(|block| json!({"id": block.id, "name": block.name, "input": block.input}))
        .collect();
    (!calls.is_empty()).then(|| Value::Array(calls))
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn complete(&self, request: &GenerationRequest) -> Result<Generation, LLMError> {
        let body = build_anthropic_body(request, &request.resolve_model(&self.default_model), false);
        let raw = self.endpoint().send(&body).await?;
        let text = serde_json::from_value::<AnthropicMessageResponse>(raw.clone())
            .map(|response| answer_text(&response.content))
            .unwrap_or_default();
        Ok(Generation::new(text, raw))
    }

    async fn generate_stream_response(
        &self,
        request: &GenerationRequest,
    ) -> Result<TextStream, LLMError> {
        let body = build_anthropic_body(request, &request.resolve_model(&self.default_model), true);
        self.endpoint()
            .open_stream(&body, Framing::ServerSentEvents, extract_fragment)
            .await
    }

    fn usage_data(&self, generation: &Generation) -> Option<Usage> {
        let usage = Self::decode(generation)?.usage?;
        Some(Usage {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        })
    }

    fn response_metadata(&self, generation: &Generation) -> Option<ResponseMetadata> {
        let raw = generation.raw.clone()?;
        let response = Self::decode(generation)?;
        let usage = response.usage.unwrap_or_default();
        Some(ResponseMetadata::Anthropic(AnthropicMetadata {
            thinking: thinking_text(&response.content),
            tool_calls: tool_calls(&response.content),
            model: response.model,
            id: response.id,
            kind: response.kind,
            role: response.role,
            stop_reason: response.stop_reason,
            stop_sequence: response.stop_sequence,
            cache_creation_input_tokens: usage.cache_creation_input_tokens,
            cache_read_input_tokens: usage.cache_read_input_tokens,
            cache_creation: usage.cache_creation,
            service_tier: usage.service_tier,
            raw,
        }))
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            supports_native_stream: true,
            supports_structured_output: false,
            reports_usage: true,
        }
    }

    fn name(&self) -> &'static str {
        VENDOR
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}
