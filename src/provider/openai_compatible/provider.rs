use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LLMError;
use crate::http::DynHttpTransport;
use crate::provider::{Endpoint, LLMProvider, join_url};
use crate::stream::{Framing, TextStream};
use crate::types::{
    CapabilityDescriptor, ChatCompletionMetadata, Generation, GenerationRequest, ResponseMetadata,
    Usage,
};

use super::request::build_chat_body;
use super::types::{ChatCompletionChunk, ChatCompletionResponse};
use super::vendor::ChatCompletionVendor;

/// Chat Completions driver parameterised by vendor flavour.
pub struct OpenAiCompatibleProvider {
    transport: DynHttpTransport,
    vendor: ChatCompletionVendor,
    api_key: String,
    base_url: String,
    default_model: String,
    timeout: Duration,
}

impl OpenAiCompatibleProvider {
    /// Creates a driver with the vendor's default base URL and model.
    pub fn new(
        transport: DynHttpTransport,
        vendor: ChatCompletionVendor,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            vendor,
            api_key: api_key.into(),
            base_url: vendor.default_base_url().to_string(),
            default_model: vendor.default_model().to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn openai(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self::new(transport, ChatCompletionVendor::OpenAi, api_key)
    }

    pub fn novita(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self::new(transport, ChatCompletionVendor::Novita, api_key)
    }

    pub fn openrouter(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self::new(transport, ChatCompletionVendor::OpenRouter, api_key)
    }

    pub fn together(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self::new(transport, ChatCompletionVendor::Together, api_key)
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

    pub fn vendor(&self) -> ChatCompletionVendor {
        self.vendor
    }

    fn endpoint(&self) -> Endpoint {
        let mut headers = HashMap::new();
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        );
        for (name, value) in self.vendor.extra_headers() {
            headers.insert(name.to_string(), value.to_string());
        }
        Endpoint {
            transport: self.transport.clone(),
            vendor: self.vendor.name(),
            url: join_url(&self.base_url, "chat/completions"),
            headers,
            timeout: self.timeout,
        }
    }

    fn decode(generation: &Generation) -> Option<ChatCompletionResponse> {
        let raw = generation.raw.as_ref()?;
        serde_json::from_value(raw.clone()).ok()
    }
}

fn extract_fragment(data: &str) -> Result<Option<String>, serde_json::Error> {
    let chunk: ChatCompletionChunk = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content))
}

#[async_trait]
impl LLMProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: &GenerationRequest) -> Result<Generation, LLMError> {
        let model = request.resolve_model(&self.default_model);
        let body = build_chat_body(self.vendor, request, &model, false);
        let raw = self.endpoint().send(&body).await?;
        let text = raw
            .pointer("/choices/0/message/content")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Generation::new(text, raw))
    }

    async fn generate_stream_response(
        &self,
        request: &GenerationRequest,
    ) -> Result<TextStream, LLMError> {
        let model = request.resolve_model(&self.default_model);
        let body = build_chat_body(self.vendor, request, &model, true);
        self.endpoint()
            .open_stream(&body, Framing::ServerSentEvents, extract_fragment)
            .await
    }

    fn usage_data(&self, generation: &Generation) -> Option<Usage> {
        let usage = Self::decode(generation)?.usage?;
        Some(Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }

    fn response_metadata(&self, generation: &Generation) -> Option<ResponseMetadata> {
        let raw = generation.raw.clone()?;
        let response = Self::decode(generation)?;
        let choice = response.choices.into_iter().next().unwrap_or_default();
        let message = choice.message.unwrap_or_default();
        let usage = response.usage.unwrap_or_default();
        let cached_tokens = usage
            .prompt_tokens_details
            .as_ref()
            .and_then(|details| details.get("cached_tokens"))
            .and_then(serde_json::Value::as_u64);

        Some(ResponseMetadata::ChatCompletion(ChatCompletionMetadata {
            model: response.model,
            id: response.id,
            object: response.object,
            created: response.created,
            index: choice.index,
            finish_reason: choice.finish_reason,
            refusal: message.refusal,
            annotations: message.annotations,
            logprobs: choice.logprobs,
            total_tokens: usage.total_tokens,
            prompt_tokens_details: usage.prompt_tokens_details,
            completion_tokens_details: usage.completion_tokens_details,
            cached_tokens,
            service_tier: response.service_tier,
            system_fingerprint: response.system_fingerprint,
            tool_calls: message.tool_calls,
            seed: response.seed,
            raw,
        }))
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            supports_native_stream: true,
            supports_structured_output: true,
            reports_usage: true,
        }
    }

    fn name(&self) -> &'static str {
        self.vendor.name()
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::http::scripted::ScriptedTransport;
    use crate::message::Message;

    fn request() -> GenerationRequest {
        GenerationRequest::new().with_user_messages(vec![Message::user("Hello").unwrap()])
    }

    fn completion_body() -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000u64,
            "model": "gpt-4o-2024-08-06",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hi there", "refusal": null},
                "finish_reason": "stop",
                "logprobs": null
            }],
            "usage": {
                "prompt_tokens": 9,
                "completion_tokens": 3,
                "total_tokens": 12,
                "prompt_tokens_details": {"cached_tokens": 2}
            },
            "system_fingerprint": "fp_1"
        })
    }

    #[tokio::test]
    async fn openai_complete_reads_answer_usage_and_metadata() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, completion_body());
        let provider = OpenAiCompatibleProvider::openai(transport.clone(), "sk-test");

        let generation = provider.complete(&request()).await.unwrap();

        assert_eq!(generation.text, "Hi there");
        let sent = &transport.requests()[0];
        assert_eq!(sent.url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(
            sent.headers.get("Authorization").map(String::as_str),
            Some("Bearer sk-test")
        );
        assert_eq!(sent.json_body().unwrap()["model"], json!("gpt-4o"));

        let usage = provider.usage_data(&generation).unwrap();
        assert_eq!(usage.input_tokens, Some(9));
        assert_eq!(usage.output_tokens, Some(3));

        match provider.response_metadata(&generation).unwrap() {
            ResponseMetadata::ChatCompletion(meta) => {
                assert_eq!(meta.id.as_deref(), Some("chatcmpl-1"));
                assert_eq!(meta.finish_reason.as_deref(), Some("stop"));
                assert_eq!(meta.total_tokens, Some(12));
                assert_eq!(meta.cached_tokens, Some(2));
                assert_eq!(meta.system_fingerprint.as_deref(), Some("fp_1"));
            }
            other => panic!("unexpected metadata: {other:?}"),
        }
    }

    #[tokio::test]
    async fn openrouter_sends_attribution_headers() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, completion_body());
        let provider = OpenAiCompatibleProvider::openrouter(transport.clone(), "or-key");

        provider.complete(&request()).await.unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.url, "https://openrouter.ai/api/v1/chat/completions");
        assert_eq!(
            sent.headers.get("HTTP-Referer").map(String::as_str),
            Some("https://openrouter.ai/api/v1")
        );
        assert_eq!(sent.headers.get("X-Title").map(String::as_str), Some("OpenRouter"));
        assert_eq!(sent.json_body().unwrap()["model"], json!("openrouter/auto"));
    }

    #[tokio::test]
    async fn missing_usage_block_yields_none() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"choices": [{"message": {"content": "ok"}}]}));
        let provider = OpenAiCompatibleProvider::together(transport, "key");

        let generation = provider.complete(&request()).await.unwrap();
        assert_eq!(generation.text, "ok");
        assert!(provider.usage_data(&generation).is_none());
    }

    #[tokio::test]
    async fn stream_mode_concatenates_sse_deltas() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_chunks(
            200,
            [
                "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
                "data: {broken\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n",
                "data: [DONE]\n\n",
            ],
        );
        let provider = OpenAiCompatibleProvider::novita(transport.clone(), "key");

        let generation = provider
            .generate_response(&request().with_stream_mode(true))
            .await
            .unwrap();

        assert_eq!(generation.text, "Hi there");
        assert!(provider.usage_data(&generation).is_none());
        assert_eq!(transport.last_json_body().unwrap()["stream"], json!(true));
    }

    #[tokio::test]
    async fn failed_stream_call_reports_body() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_text(429, r#"{"error":{"message":"Rate limit reached","code":"rate_limit"}}"#);
        let provider = OpenAiCompatibleProvider::openai(transport, "key");

        let err = match provider.generate_stream_response(&request()).await {
            Err(err) => err,
            Ok(_) => panic!("expected failure"),
        };
        match err {
            LLMError::VendorRequest { vendor, status, message } => {
                assert_eq!(vendor, "openai");
                assert_eq!(status, Some(429));
                assert!(message.contains("Rate limit reached (rate_limit)"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
