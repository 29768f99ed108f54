//! One fluent request surface over several LLM vendors.
//!
//! A [`RequestBuilder`] collects the provider key, model, system instruction,
//! temperature, structured-output format and messages of one request. Its
//! terminal calls resolve the vendor driver from a [`registry::DriverRegistry`],
//! translate the request into that vendor's wire format and return a
//! vendor-agnostic [`AiResponse`] or a [`TextStream`] of answer fragments.

pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod message;
pub mod provider;
pub mod registry;
pub mod stream;
pub mod types;

pub use client::{AiClient, AiClientBuilder, RequestBuilder};
pub use config::{AiConfig, ProviderKind};
pub use error::LLMError;
pub use message::{Message, Role};
pub use provider::{DynProvider, LLMProvider};
pub use stream::TextStream;
pub use types::*;
