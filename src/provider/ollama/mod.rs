//! Ollama's local `/api/chat` endpoint.

mod provider;
mod request;
mod types;

pub use provider::{DEFAULT_BASE_URL, DEFAULT_MODEL, OllamaProvider};
