use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::error::LLMError;
use crate::http::DynHttpTransport;
use crate::provider::DynProvider;
use crate::provider::anthropic::{self, AnthropicProvider};
use crate::provider::modelslab::{self, ModelsLabProvider};
use crate::provider::ollama::{self, OllamaProvider};
use crate::provider::openai_compatible::{ChatCompletionVendor, OpenAiCompatibleProvider};
use crate::registry::DriverRegistry;

pub const DEFAULT_PROVIDER: &str = "ollama";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Built-in provider keys.
///
/// Parsing an unknown key yields [`LLMError::DriverNotSupported`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(
    serialize_all = "lowercase",
    parse_err_ty = LLMError,
    parse_err_fn = unsupported_driver
)]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    Anthropic,
    Novita,
    OpenRouter,
    Together,
    ModelsLab,
}

impl ProviderKind {
    /// Registry key.
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }

    /// Human-readable vendor name.
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "Ollama",
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::Novita => "Novita",
            ProviderKind::OpenRouter => "OpenRouter",
            ProviderKind::Together => "Together",
            ProviderKind::ModelsLab => "ModelsLab",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => ollama::DEFAULT_BASE_URL,
            ProviderKind::Anthropic => anthropic::DEFAULT_BASE_URL,
            ProviderKind::ModelsLab => modelslab::DEFAULT_BASE_URL,
            other => other.chat_completion_vendor().map_or("", |vendor| vendor.default_base_url()),
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => ollama::DEFAULT_MODEL,
            ProviderKind::Anthropic => anthropic::DEFAULT_MODEL,
            ProviderKind::ModelsLab => modelslab::DEFAULT_MODEL,
            other => other.chat_completion_vendor().map_or("", |vendor| vendor.default_model()),
        }
    }

    /// Whether the vendor rejects unauthenticated calls.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }

    fn chat_completion_vendor(&self) -> Option<ChatCompletionVendor> {
        match self {
            ProviderKind::OpenAi => Some(ChatCompletionVendor::OpenAi),
            ProviderKind::Novita => Some(ChatCompletionVendor::Novita),
            ProviderKind::OpenRouter => Some(ChatCompletionVendor::OpenRouter),
            ProviderKind::Together => Some(ChatCompletionVendor::Together),
            _ => None,
        }
    }

    fn env_prefix(&self) -> String {
        self.as_str().to_ascii_uppercase()
    }
}

impl From<ProviderKind> for String {
    fn from(kind: ProviderKind) -> Self {
        kind.as_str().to_string()
    }
}

fn unsupported_driver(value: &str) -> LLMError {
    LLMError::DriverNotSupported {
        driver: value.to_string(),
    }
}

/// Per-vendor connection settings. Unset fields fall back to vendor defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

/// Conversation history switch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default)]
    pub enabled: bool,
    /// SQLite path; `:memory:` is accepted.
    #[serde(default)]
    pub connection: Option<String>,
}

/// Top-level configuration.
///
/// # Examples
///
/// ```
/// use llm_relay::config::AiConfig;
///
/// let config = AiConfig::from_json_str(
///     r#"{"default_provider": "openai", "providers": {"openai": {"api_key": "sk-test"}}}"#,
/// )
/// .unwrap();
/// assert_eq!(config.default_provider, "openai");
/// assert!(!config.history.enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub history: HistoryConfig,
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            providers: HashMap::new(),
            history: HistoryConfig::default(),
        }
    }
}

impl AiConfig {
    /// Parses a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, LLMError> {
        serde_json::from_str(json).map_err(|err| LLMError::InvalidConfig {
            field: "config".to_string(),
            reason: err.to_string(),
        })
    }

    /// Reads configuration from the process environment, loading `.env`
    /// first when present.
    pub fn from_env() -> Result<Self, LLMError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    ///
    /// Recognised keys: `AI_PROVIDER`, `AI_HISTORY_ENABLED`,
    /// `AI_HISTORY_CONNECTION`, and per vendor `<VENDOR>_BASE_URL`,
    /// `<VENDOR>_API_KEY`, `<VENDOR>_DEFAULT_MODEL`, `<VENDOR>_TIMEOUT`
    /// where `<VENDOR>` is the upper-cased provider key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LLMError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut config = AiConfig::default();
        if let Some(provider) = read("AI_PROVIDER") {
            config.default_provider = provider;
        }

        for kind in ProviderKind::iter() {
            let prefix = kind.env_prefix();
            let timeout_key = format!("{prefix}_TIMEOUT");
            let timeout_secs = match read(&timeout_key) {
                Some(raw) => Some(raw.trim().parse::<u64>().map_err(|err| {
                    LLMError::InvalidConfig {
                        field: timeout_key.clone(),
                        reason: err.to_string(),
                    }
                })?),
                None => None,
            };
            let provider = ProviderConfig {
                base_url: read(&format!("{prefix}_BASE_URL")),
                api_key: read(&format!("{prefix}_API_KEY")),
                default_model: read(&format!("{prefix}_DEFAULT_MODEL")),
                timeout_secs,
            };
            if provider != ProviderConfig::default() {
                config.providers.insert(kind.as_str().to_string(), provider);
            }
        }

        if let Some(raw) = read("AI_HISTORY_ENABLED") {
            config.history.enabled = parse_flag(&raw).ok_or_else(|| LLMError::InvalidConfig {
                field: "AI_HISTORY_ENABLED".to_string(),
                reason: format!("expected a boolean, got '{raw}'"),
            })?;
        }
        config.history.connection = read("AI_HISTORY_CONNECTION");

        Ok(config)
    }

    /// Settings for `key`, or defaults when none were given.
    pub fn provider(&self, key: &str) -> ProviderConfig {
        self.providers.get(key).cloned().unwrap_or_default()
    }

    /// Registry with one lazily constructed driver per built-in provider.
    pub fn build_registry(&self, transport: DynHttpTransport) -> DriverRegistry {
        let mut registry = DriverRegistry::new();
        for kind in ProviderKind::iter() {
            let settings = self.provider(kind.as_str());
            let transport = transport.clone();
            registry.register(kind.as_str(), move || {
                build_provider(kind, &settings, transport.clone())
            });
        }
        registry
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Constructs the driver for a built-in provider.
///
/// # Errors
///
/// [`LLMError::InvalidConfig`] when the vendor needs an API key and none is set.
pub fn build_provider(
    kind: ProviderKind,
    settings: &ProviderConfig,
    transport: DynHttpTransport,
) -> Result<DynProvider, LLMError> {
    let base_url = settings
        .base_url
        .clone()
        .unwrap_or_else(|| kind.default_base_url().to_string());
    let model = settings
        .default_model
        .clone()
        .unwrap_or_else(|| kind.default_model().to_string());
    let timeout = settings.timeout();

    let provider: DynProvider = match kind {
        ProviderKind::Ollama => Arc::new(
            OllamaProvider::new(transport)
                .with_base_url(base_url)
                .with_default_model(model)
                .with_timeout(timeout),
        ),
        ProviderKind::Anthropic => Arc::new(
            AnthropicProvider::new(transport, require_api_key(kind, settings)?)
                .with_base_url(base_url)
                .with_default_model(model)
                .with_timeout(timeout),
        ),
        ProviderKind::ModelsLab => Arc::new(
            ModelsLabProvider::new(transport, require_api_key(kind, settings)?)
                .with_base_url(base_url)
                .with_default_model(model)
                .with_timeout(timeout),
        ),
        ProviderKind::OpenAi
        | ProviderKind::Novita
        | ProviderKind::OpenRouter
        | ProviderKind::Together => {
            let vendor = kind
                .chat_completion_vendor()
                .ok_or_else(|| LLMError::DriverNotSupported {
                    driver: kind.as_str().to_string(),
                })?;
            Arc::new(
                OpenAiCompatibleProvider::new(transport, vendor, require_api_key(kind, settings)?)
                    .with_base_url(base_url)
                    .with_default_model(model)
                    .with_timeout(timeout),
            )
        }
    };
    Ok(provider)
}

fn require_api_key(kind: ProviderKind, settings: &ProviderConfig) -> Result<String, LLMError> {
    settings
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| LLMError::InvalidConfig {
            field: format!("{}.api_key", kind.as_str()),
            reason: format!("{} requires an API key", kind.label()),
        })
}
