//! Request state handed to providers and the normalized result handed back.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LLMError;
use crate::message::Message;

pub mod catalog;
pub mod metadata;

pub use catalog::{NovitaModel, TogetherModel};
pub use metadata::{AnthropicMetadata, ChatCompletionMetadata, OllamaMetadata, ResponseMetadata};

/// Sampling temperature, always within `[0.1, 2.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Temperature(f64);

impl Temperature {
    pub const MIN: f64 = 0.1;
    pub const MAX: f64 = 2.0;

    /// # Errors
    ///
    /// Returns [`LLMError::Validation`] for values outside `[0.1, 2.0]` and NaN.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_relay::types::Temperature;
    ///
    /// assert_eq!(Temperature::new(0.1).unwrap().value(), 0.1);
    /// assert!(Temperature::new(2.5).is_err());
    /// assert!(Temperature::new(f64::NAN).is_err());
    /// ```
    pub fn new(value: f64) -> Result<Self, LLMError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(LLMError::validation(
                "Temperature must be between 0.1 and 2.0",
            ))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for Temperature {
    fn default() -> Self {
        Self(1.0)
    }
}

impl TryFrom<f64> for Temperature {
    type Error = LLMError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Temperature> for f64 {
    fn from(temperature: Temperature) -> Self {
        temperature.0
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Named temperature presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Creativity {
    Low,
    Medium,
    High,
    VeryHigh,
    Extreme,
}

impl Creativity {
    pub fn temperature(&self) -> Temperature {
        Temperature(match self {
            Creativity::Low => 0.2,
            Creativity::Medium => 0.5,
            Creativity::High => 0.8,
            Creativity::VeryHigh => 1.0,
            Creativity::Extreme => 1.5,
        })
    }
}

impl From<Creativity> for Temperature {
    fn from(creativity: Creativity) -> Self {
        creativity.temperature()
    }
}

/// Complete request state for one provider call.
///
/// Providers never hold request state themselves; every call receives a
/// fully populated `GenerationRequest`, so one provider instance can serve
/// concurrent requests with different models, messages and temperatures.
///
/// # Examples
///
/// ```
/// use llm_relay::message::Message;
/// use llm_relay::types::{GenerationRequest, Temperature};
///
/// let request = GenerationRequest::new()
///     .with_model("llama3")
///     .with_system_instruction("Answer in one sentence.")
///     .with_user_messages(vec![Message::user("Hello").unwrap()])
///     .with_temperature(Temperature::new(0.5).unwrap());
/// assert_eq!(request.resolve_model("fallback"), "llama3");
/// assert!(!request.stream);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Overrides the provider's default model.
    pub model: Option<String>,
    pub system_instruction: Option<String>,
    /// Merged conversation, oldest first.
    pub messages: Vec<Message>,
    pub temperature: Temperature,
    /// Structured-output schema in the vendor's `response_format` shape.
    pub response_format: Option<Value>,
    /// When set, eager generation drains the streaming endpoint instead.
    pub stream: bool,
}

impl GenerationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_user_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_temperature(mut self, temperature: Temperature) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_response_format(mut self, format: Value) -> Self {
        self.response_format = Some(format);
        self
    }

    pub fn with_stream_mode(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Model to send: the explicit one, else the provider default.
    pub fn resolve_model(&self, default_model: &str) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| default_model.to_string())
    }

    /// Messages in wire form, with the system instruction prepended as a
    /// `system` message when present.
    pub(crate) fn wire_messages_with_system(&self) -> Vec<Value> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        if let Some(instruction) = &self.system_instruction {
            messages.push(serde_json::json!({ "role": "system", "content": instruction }));
        }
        messages.extend(self.messages.iter().map(Message::to_value));
        messages
    }
}

/// Result of one eager provider call.
///
/// `raw` holds the decoded response body and feeds
/// [`crate::LLMProvider::usage_data`] and
/// [`crate::LLMProvider::response_metadata`]; it is `None` when the answer
/// was assembled from a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub raw: Option<Value>,
}

impl Generation {
    pub fn new(text: impl Into<String>, raw: Value) -> Self {
        Self {
            text: text.into(),
            raw: Some(raw),
        }
    }

    pub fn streamed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            raw: None,
        }
    }
}

/// Token counts reported by the vendor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// Vendor-agnostic result of [`crate::RequestBuilder::run`].
///
/// Fields a vendor did not report stay `None`; they are never defaulted to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResponse {
    pub answer: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    /// Provider key that served the request.
    pub provider: String,
    pub metadata: Option<ResponseMetadata>,
}

impl AiResponse {
    pub fn model(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(ResponseMetadata::model)
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(ResponseMetadata::finish_reason)
    }

    pub fn thinking(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(ResponseMetadata::thinking)
    }

    pub fn raw(&self) -> Option<&Value> {
        self.metadata.as_ref().map(ResponseMetadata::raw)
    }
}

/// Capability subset a provider honors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// The vendor streams natively; otherwise stream mode yields one chunk.
    pub supports_native_stream: bool,
    /// `response_format` is forwarded to the vendor.
    pub supports_structured_output: bool,
    /// Token counts are reported.
    pub reports_usage: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_accepts_inclusive_bounds() {
        for value in [0.1, 0.5, 1.0, 1.999, 2.0] {
            assert_eq!(Temperature::new(value).expect("in range").value(), value);
        }
    }

    #[test]
    fn temperature_rejects_out_of_range_values() {
        for value in [0.0, 0.09, -1.0, 2.0001, 10.0, f64::INFINITY, f64::NAN] {
            assert!(matches!(
                Temperature::new(value),
                Err(LLMError::Validation { .. })
            ));
        }
    }

    #[test]
    fn temperature_deserialization_is_validated() {
        assert!(serde_json::from_str::<Temperature>("0.7").is_ok());
        assert!(serde_json::from_str::<Temperature>("3.0").is_err());
    }

    #[test]
    fn creativity_presets_map_to_temperatures() {
        assert_eq!(Creativity::Low.temperature().value(), 0.2);
        assert_eq!(Creativity::Medium.temperature().value(), 0.5);
        assert_eq!(Creativity::High.temperature().value(), 0.8);
        assert_eq!(Creativity::VeryHigh.temperature().value(), 1.0);
        assert_eq!(Creativity::Extreme.temperature().value(), 1.5);
    }

    #[test]
    fn wire_messages_prepend_system_instruction() {
        let request = GenerationRequest::new()
            .with_system_instruction("Be brief.")
            .with_user_messages(vec![Message::user("Hi").unwrap()]);
        let wire = request.wire_messages_with_system();
        assert_eq!(
            wire,
            vec![
                serde_json::json!({"role": "system", "content": "Be brief."}),
                serde_json::json!({"role": "user", "content": "Hi"}),
            ]
        );
    }
}
