use serde_json::{Value, json};

/// Vendor flavour of an OpenAI-compatible endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatCompletionVendor {
    OpenAi,
    Novita,
    OpenRouter,
    Together,
}

impl ChatCompletionVendor {
    /// Provider key used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            ChatCompletionVendor::OpenAi => "openai",
            ChatCompletionVendor::Novita => "novita",
            ChatCompletionVendor::OpenRouter => "openrouter",
            ChatCompletionVendor::Together => "together",
        }
    }

    /// Base URL to which `/chat/completions` is appended.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ChatCompletionVendor::OpenAi => "https://api.openai.com/v1",
            ChatCompletionVendor::Novita => "https://api.novita.ai/v3/openai",
            ChatCompletionVendor::OpenRouter => "https://openrouter.ai/api/v1",
            ChatCompletionVendor::Together => "https://api.together.xyz/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ChatCompletionVendor::OpenAi => "gpt-4o",
            ChatCompletionVendor::Novita => "deepseek/deepseek-v3-0324",
            ChatCompletionVendor::OpenRouter => "openrouter/auto",
            ChatCompletionVendor::Together => "meta-llama/Llama-3.3-70B-Instruct-Turbo",
        }
    }

    /// Fixed sampling parameters sent alongside `temperature`.
    pub(crate) fn sampling_extras(&self) -> Vec<(&'static str, Value)> {
        match self {
            ChatCompletionVendor::Novita | ChatCompletionVendor::OpenRouter => vec![
                ("top_p", json!(1)),
                ("min_p", json!(0)),
                ("top_k", json!(50)),
                ("presence_penalty", json!(0)),
                ("frequency_penalty", json!(0)),
                ("repetition_penalty", json!(1)),
            ],
            ChatCompletionVendor::OpenAi | ChatCompletionVendor::Together => Vec::new(),
        }
    }

    /// Headers beyond bearer auth.
    pub(crate) fn extra_headers(&self) -> Vec<(&'static str, &'static str)> {
        match self {
            ChatCompletionVendor::OpenRouter => vec![
                ("HTTP-Referer", "https://openrouter.ai/api/v1"),
                ("X-Title", "OpenRouter"),
            ],
            _ => Vec::new(),
        }
    }
}
