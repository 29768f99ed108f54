//! ModelsLab uncensored chat endpoint.
//!
//! The vendor has no streaming API: stream mode performs the eager call and
//! yields the complete answer as a single fragment.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use serde_json::{Map, Value, json};

use crate::error::LLMError;
use crate::http::DynHttpTransport;
use crate::provider::{Endpoint, LLMProvider, join_url};
use crate::stream::TextStream;
use crate::types::{CapabilityDescriptor, Generation, GenerationRequest};

pub const DEFAULT_BASE_URL: &str = "https://modelslab.com";
pub const DEFAULT_MODEL: &str = "ModelsLab/Llama-3.1-8b-Uncensored-Dare";
const MAX_TOKENS: u32 = 1000;
const VENDOR: &str = "modelslab";

/// ModelsLab driver. The API key travels in the request body.
pub struct ModelsLabProvider {
    transport: DynHttpTransport,
    api_key: String,
    base_url: String,
    default_model: String,
    timeout: Duration,
}

impl ModelsLabProvider {
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
        Endpoint {
            transport: self.transport.clone(),
            vendor: VENDOR,
            url: join_url(&self.base_url, "api/v6/llm/uncensored_chat"),
            headers: Default::default(),
            timeout: self.timeout,
        }
    }

    fn build_body(&self, request: &GenerationRequest) -> Value {
        let mut body = Map::new();
        body.insert("key".into(), json!(self.api_key));
        body.insert("model_id".into(), json!(request.resolve_model(&self.default_model)));
        body.insert(
            "messages".into(),
            Value::Array(request.wire_messages_with_system()),
        );
        body.insert("max_tokens".into(), json!(MAX_TOKENS));
        body.insert("temperature".into(), json!(request.temperature.value()));
        Value::Object(body)
    }
}

#[async_trait]
impl LLMProvider for ModelsLabProvider {
    async fn complete(&self, request: &GenerationRequest) -> Result<Generation, LLMError> {
        let raw = self.endpoint().send(&self.build_body(request)).await?;
        // Errors can arrive with HTTP 200 and `"status": "error"`.
        if raw.get("status").and_then(Value::as_str) == Some("error") {
            return Err(LLMError::vendor(VENDOR, Some(200), raw.to_string()));
        }
        let text = raw
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Generation::new(text, raw))
    }

    async fn generate_stream_response(
        &self,
        request: &GenerationRequest,
    ) -> Result<TextStream, LLMError> {
        let generation = self.complete(request).await?;
        let fragments = if generation.text.is_empty() {
            Vec::new()
        } else {
            vec![Ok(generation.text)]
        };
        Ok(Box::pin(stream::iter(fragments)))
    }

    async fn generate_response(&self, request: &GenerationRequest) -> Result<Generation, LLMError> {
        self.complete(request).await
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            supports_native_stream: false,
            supports_structured_output: false,
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures_util::StreamExt;

    use super::*;
    use crate::http::scripted::ScriptedTransport;
    use crate::message::Message;

    fn request() -> GenerationRequest {
        GenerationRequest::new()
            .with_system_instruction("Stay in character.")
            .with_user_messages(vec![Message::user("Hello").unwrap()])
    }

    #[tokio::test]
    async fn key_travels_in_body_and_answer_comes_from_message() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"status": "success", "message": "Hi there"}));
        let provider = ModelsLabProvider::new(transport.clone(), "ml-key");

        let generation = provider.complete(&request()).await.unwrap();

        assert_eq!(generation.text, "Hi there");
        let sent = &transport.requests()[0];
        assert_eq!(sent.url, "https://modelslab.com/api/v6/llm/uncensored_chat");
        assert_eq!(
            sent.json_body().unwrap(),
            json!({
                "key": "ml-key",
                "model_id": DEFAULT_MODEL,
                "messages": [
                    {"role": "system", "content": "Stay in character."},
                    {"role": "user", "content": "Hello"}
                ],
                "max_tokens": 1000,
                "temperature": 1.0
            })
        );
        assert!(provider.usage_data(&generation).is_none());
        assert!(provider.response_metadata(&generation).is_none());
    }

    #[tokio::test]
    async fn stream_mode_yields_one_chunk_from_one_call() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"message": "Whole answer"}));
        let provider = ModelsLabProvider::new(transport.clone(), "ml-key");

        let chunks: Vec<String> = provider
            .generate_stream_response(&request().with_stream_mode(true))
            .await
            .unwrap()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;

        assert_eq!(chunks, vec!["Whole answer".to_string()]);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn error_status_in_body_is_a_vendor_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"status": "error", "message": "Invalid API key"}));
        let provider = ModelsLabProvider::new(transport, "bad");

        let err = provider.complete(&request()).await.unwrap_err();
        match err {
            LLMError::VendorRequest { vendor, message, .. } => {
                assert_eq!(vendor, "modelslab");
                assert!(message.contains("Invalid API key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
