//! Vendors speaking the OpenAI Chat Completions wire format.
//!
//! OpenAI, Novita, OpenRouter and Together share one request body, one SSE
//! delta format and one usage block; [`ChatCompletionVendor`] captures the
//! per-vendor differences (base URL, extra sampling parameters, headers).

mod provider;
mod request;
mod types;
mod vendor;

pub use provider::OpenAiCompatibleProvider;
pub use vendor::ChatCompletionVendor;
