//! Anthropic Messages API.

mod provider;
mod request;
mod types;

pub use provider::{AnthropicProvider, DEFAULT_BASE_URL, DEFAULT_MODEL};
