//! Vendor-specific response metadata.
//!
//! [`ResponseMetadata`] is tagged by vendor family; fields shared across
//! families are exposed through accessor methods.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Extras reported by Ollama's `/api/chat`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OllamaMetadata {
    pub model: Option<String>,
    pub created_at: Option<String>,
    pub done: Option<bool>,
    pub done_reason: Option<String>,
    /// Nanoseconds.
    pub total_duration: Option<u64>,
    pub load_duration: Option<u64>,
    pub prompt_eval_count: Option<u64>,
    pub prompt_eval_duration: Option<u64>,
    pub eval_count: Option<u64>,
    pub eval_duration: Option<u64>,
    pub thinking: Option<String>,
    pub raw: Value,
}

/// Extras reported by OpenAI-style chat completion endpoints
/// (OpenAI, Novita, OpenRouter, Together).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionMetadata {
    pub model: Option<String>,
    pub id: Option<String>,
    pub object: Option<String>,
    pub created: Option<u64>,
    pub index: Option<u64>,
    pub finish_reason: Option<String>,
    pub refusal: Option<String>,
    pub annotations: Option<Value>,
    pub logprobs: Option<Value>,
    pub total_tokens: Option<u64>,
    pub prompt_tokens_details: Option<Value>,
    pub completion_tokens_details: Option<Value>,
    pub cached_tokens: Option<u64>,
    pub service_tier: Option<String>,
    pub system_fingerprint: Option<String>,
    pub tool_calls: Option<Value>,
    pub seed: Option<u64>,
    pub raw: Value,
}

/// Extras reported by Anthropic's Messages API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnthropicMetadata {
    pub model: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub role: Option<String>,
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
    pub cache_creation_input_tokens: Option<u64>,
    pub cache_read_input_tokens: Option<u64>,
    pub cache_creation: Option<Value>,
    pub service_tier: Option<String>,
    pub thinking: Option<String>,
    pub tool_calls: Option<Value>,
    pub raw: Value,
}

/// Metadata tagged by vendor family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ResponseMetadata {
    Ollama(OllamaMetadata),
    ChatCompletion(ChatCompletionMetadata),
    Anthropic(AnthropicMetadata),
}

impl ResponseMetadata {
    /// Model that actually served the request.
    pub fn model(&self) -> Option<&str> {
        match self {
            ResponseMetadata::Ollama(meta) => meta.model.as_deref(),
            ResponseMetadata::ChatCompletion(meta) => meta.model.as_deref(),
            ResponseMetadata::Anthropic(meta) => meta.model.as_deref(),
        }
    }

    /// Vendor response identifier.
    pub fn id(&self) -> Option<&str> {
        match self {
            ResponseMetadata::Ollama(_) => None,
            ResponseMetadata::ChatCompletion(meta) => meta.id.as_deref(),
            ResponseMetadata::Anthropic(meta) => meta.id.as_deref(),
        }
    }

    /// Why generation stopped: `done_reason`, `finish_reason` or `stop_reason`.
    pub fn finish_reason(&self) -> Option<&str> {
        match self {
            ResponseMetadata::Ollama(meta) => meta.done_reason.as_deref(),
            ResponseMetadata::ChatCompletion(meta) => meta.finish_reason.as_deref(),
            ResponseMetadata::Anthropic(meta) => meta.stop_reason.as_deref(),
        }
    }

    /// Reasoning text when the model exposed it.
    pub fn thinking(&self) -> Option<&str> {
        match self {
            ResponseMetadata::Ollama(meta) => meta.thinking.as_deref(),
            ResponseMetadata::ChatCompletion(_) => None,
            ResponseMetadata::Anthropic(meta) => meta.thinking.as_deref(),
        }
    }

    /// Tool invocations requested by the model, in vendor shape.
    pub fn tool_calls(&self) -> Option<&Value> {
        match self {
            ResponseMetadata::Ollama(_) => None,
            ResponseMetadata::ChatCompletion(meta) => meta.tool_calls.as_ref(),
            ResponseMetadata::Anthropic(meta) => meta.tool_calls.as_ref(),
        }
    }

    /// Full decoded response body.
    pub fn raw(&self) -> &Value {
        match self {
            ResponseMetadata::Ollama(meta) => &meta.raw,
            ResponseMetadata::ChatCompletion(meta) => &meta.raw,
            ResponseMetadata::Anthropic(meta) => &meta.raw,
        }
    }
}
