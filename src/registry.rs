//! Provider key to driver factory mapping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use crate::error::LLMError;
use crate::provider::DynProvider;

/// Builds a driver on first use. Captures the vendor's configuration.
pub type DriverFactory = Arc<dyn Fn() -> Result<DynProvider, LLMError> + Send + Sync>;

/// Explicit registry from provider key to driver factory.
///
/// Drivers are created lazily on first resolution and cached afterwards;
/// they hold no per-request state, so one instance serves every request.
/// A factory that fails is retried on the next resolution.
#[derive(Default)]
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
    instances: Mutex<HashMap<String, DynProvider>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the factory behind `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use llm_relay::http::scripted::ScriptedTransport;
    /// use llm_relay::provider::ollama::OllamaProvider;
    /// use llm_relay::registry::DriverRegistry;
    ///
    /// let mut registry = DriverRegistry::new();
    /// registry.register("local", || {
    ///     Ok(Arc::new(OllamaProvider::new(Arc::new(ScriptedTransport::new()))))
    /// });
    /// assert_eq!(registry.resolve("local").unwrap().name(), "ollama");
    /// assert!(registry.resolve("remote").is_err());
    /// ```
    pub fn register<F>(&mut self, key: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Result<DynProvider, LLMError> + Send + Sync + 'static,
    {
        let key = key.into();
        self.instances
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        self.factories.insert(key, Arc::new(factory));
        self
    }

    /// Registers an already constructed driver.
    pub fn register_instance(&mut self, key: impl Into<String>, provider: DynProvider) -> &mut Self {
        self.register(key, move || Ok(provider.clone()))
    }

    /// Returns the driver for `key`, creating it on first use.
    ///
    /// # Errors
    ///
    /// [`LLMError::DriverNotSupported`] for an unregistered key, or whatever
    /// the factory reports, typically [`LLMError::InvalidConfig`].
    pub fn resolve(&self, key: &str) -> Result<DynProvider, LLMError> {
        let factory = self
            .factories
            .get(key)
            .ok_or_else(|| LLMError::DriverNotSupported {
                driver: key.to_string(),
            })?;

        let mut instances = self
            .instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(provider) = instances.get(key) {
            return Ok(provider.clone());
        }

        let provider = factory()?;
        info!(driver = key, vendor = provider.name(), "driver instantiated");
        instances.insert(key.to_string(), provider.clone());
        Ok(provider)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.factories.keys().cloned().collect();
        keys.sort();
        keys
    }
}
