use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::LLMError;
use crate::http::{DynHttpTransport, post_json_stream_with_headers, post_json_with_headers};
use crate::stream::{FragmentExtractor, Framing, TextStream, collect_body_text, collect_text, text_stream};
use crate::types::{CapabilityDescriptor, Generation, GenerationRequest, ResponseMetadata, Usage};

pub mod anthropic;
mod error;
pub mod modelslab;
pub mod ollama;
pub mod openai_compatible;

pub(crate) use error::vendor_error;

/// Uniform contract every vendor driver implements.
///
/// Drivers are stateless between calls: request state arrives with each
/// [`GenerationRequest`] and the decoded response travels back inside the
/// returned [`Generation`], from which usage and metadata are derived.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// One non-streaming call to the vendor.
    async fn complete(&self, request: &GenerationRequest) -> Result<Generation, LLMError>;

    /// Issues a streaming call and yields answer fragments as they arrive.
    async fn generate_stream_response(
        &self,
        request: &GenerationRequest,
    ) -> Result<TextStream, LLMError>;

    /// Eager generation. In stream mode the streaming call is drained and its
    /// fragments concatenated.
    async fn generate_response(&self, request: &GenerationRequest) -> Result<Generation, LLMError> {
        if request.stream {
            let stream = self.generate_stream_response(request).await?;
            return Ok(Generation::streamed(collect_text(stream).await?));
        }
        self.complete(request).await
    }

    /// Token counts of a completed call; `None` when the vendor reports none.
    fn usage_data(&self, _generation: &Generation) -> Option<Usage> {
        None
    }

    /// Vendor-specific extras of a completed call.
    fn response_metadata(&self, _generation: &Generation) -> Option<ResponseMetadata> {
        None
    }

    /// Describes the capability subset this driver honors.
    fn capabilities(&self) -> CapabilityDescriptor;

    /// Provider key, such as `ollama`.
    fn name(&self) -> &'static str;

    /// Model sent when a request names none.
    fn default_model(&self) -> &str;
}

/// Thread-safe provider handle.
pub type DynProvider = Arc<dyn LLMProvider>;

/// Connection settings shared by every vendor driver.
#[derive(Clone)]
pub(crate) struct Endpoint {
    pub(crate) transport: DynHttpTransport,
    pub(crate) vendor: &'static str,
    pub(crate) url: String,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) timeout: Duration,
}

impl Endpoint {
    /// POSTs `body`, checks the status and decodes the JSON response.
    pub(crate) async fn send(&self, body: &Value) -> Result<Value, LLMError> {
        debug!(vendor = self.vendor, url = %self.url, model = ?body.get("model"), "sending request");
        let response = post_json_with_headers(
            self.transport.as_ref(),
            self.url.clone(),
            self.headers.clone(),
            body,
            Some(self.timeout),
        )
        .await
        .map_err(|err| err.qualify(self.vendor))?;

        let status = response.status;
        let success = response.is_success();
        let text = response
            .into_string()
            .map_err(|err| err.qualify(self.vendor))?;
        if !success {
            return Err(vendor_error(self.vendor, status, &text));
        }
        serde_json::from_str(&text).map_err(|err| {
            LLMError::vendor(
                self.vendor,
                Some(status),
                format!("failed to decode response: {err} | body: {text}"),
            )
        })
    }

    /// POSTs `body` to a streaming endpoint and exposes the answer fragments.
    pub(crate) async fn open_stream(
        &self,
        body: &Value,
        framing: Framing,
        extract: FragmentExtractor,
    ) -> Result<TextStream, LLMError> {
        debug!(vendor = self.vendor, url = %self.url, model = ?body.get("model"), "opening stream");
        let response = post_json_stream_with_headers(
            self.transport.as_ref(),
            self.url.clone(),
            self.headers.clone(),
            body,
            Some(self.timeout),
        )
        .await
        .map_err(|err| err.qualify(self.vendor))?;

        if !(200..300).contains(&response.status) {
            let text = collect_body_text(response.body, self.vendor).await?;
            return Err(vendor_error(self.vendor, response.status, &text));
        }
        Ok(text_stream(response.body, framing, self.vendor, extract))
    }
}

/// Joins a base URL and a path without doubling slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
