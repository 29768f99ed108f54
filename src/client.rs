use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::AiConfig;
use crate::error::LLMError;
use crate::history::{ConversationStore, SqliteConversationStore};
use crate::http::DynHttpTransport;
use crate::http::reqwest::default_dyn_transport;
use crate::message::{Message, MessageContent, MessageInput, Role, normalize_preview_batch};
use crate::provider::{DynProvider, LLMProvider};
use crate::registry::DriverRegistry;
use crate::stream::TextStream;
use crate::types::{AiResponse, CapabilityDescriptor, Creativity, GenerationRequest, Temperature};

/// Entry point: owns the driver registry and the optional history store.
///
/// Cheap to clone; every [`RequestBuilder`] shares the same registry.
#[derive(Clone)]
pub struct AiClient {
    registry: Arc<DriverRegistry>,
    default_provider: String,
    history: Option<Arc<dyn ConversationStore>>,
}

impl AiClient {
    pub fn builder() -> AiClientBuilder {
        AiClientBuilder {
            registry: DriverRegistry::new(),
            default_provider: crate::config::DEFAULT_PROVIDER.to_string(),
            history: None,
        }
    }

    /// Builds a client with every built-in driver registered from `config`.
    ///
    /// A history store that cannot be opened is logged and left disabled.
    pub fn from_config(config: &AiConfig, transport: DynHttpTransport) -> Self {
        let history = if config.history.enabled {
            let connection = config.history.connection.as_deref().unwrap_or(":memory:");
            match SqliteConversationStore::open(connection) {
                Ok(store) => Some(Arc::new(store) as Arc<dyn ConversationStore>),
                Err(err) => {
                    warn!(connection, error = %err, "conversation history disabled");
                    None
                }
            }
        } else {
            None
        };

        Self {
            registry: Arc::new(config.build_registry(transport)),
            default_provider: config.default_provider.clone(),
            history,
        }
    }

    /// Reads [`AiConfig::from_env`] and talks to vendors over reqwest.
    pub fn from_env() -> Result<Self, LLMError> {
        let config = AiConfig::from_env()?;
        Ok(Self::from_config(&config, default_dyn_transport()?))
    }

    /// Starts a request against the default provider.
    pub fn request(&self) -> RequestBuilder {
        RequestBuilder {
            registry: self.registry.clone(),
            history: self.history.clone(),
            provider: self.default_provider.clone(),
            model: None,
            system_instruction: None,
            temperature: Temperature::default(),
            response_format: None,
            stream: false,
            user_messages: Vec::new(),
            preview_messages: Vec::new(),
            conversation_id: None,
        }
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Capability subset honored by the driver behind `key`.
    pub fn capabilities(&self, key: &str) -> Result<CapabilityDescriptor, LLMError> {
        Ok(self.registry.resolve(key)?.capabilities())
    }
}

/// Assembles an [`AiClient`] from individually registered drivers.
pub struct AiClientBuilder {
    registry: DriverRegistry,
    default_provider: String,
    history: Option<Arc<dyn ConversationStore>>,
}

impl AiClientBuilder {
    /// Registers a driver factory under `key`.
    pub fn register<F>(mut self, key: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<DynProvider, LLMError> + Send + Sync + 'static,
    {
        self.registry.register(key, factory);
        self
    }

    /// Registers an already constructed driver under `key`.
    pub fn register_instance(mut self, key: impl Into<String>, provider: DynProvider) -> Self {
        self.registry.register_instance(key, provider);
        self
    }

    pub fn default_provider(mut self, key: impl Into<String>) -> Self {
        self.default_provider = key.into();
        self
    }

    pub fn history_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.history = Some(store);
        self
    }

    pub fn build(self) -> AiClient {
        AiClient {
            registry: Arc::new(self.registry),
            default_provider: self.default_provider,
            history: self.history,
        }
    }
}

/// Fluent, single-use description of one generation request.
///
/// Setters are order-independent and validate eagerly; nothing touches the
/// network until [`run`](Self::run), [`answer`](Self::answer) or
/// [`stream_response`](Self::stream_response).
///
/// # Examples
///
/// ```no_run
/// # async fn demo() -> Result<(), llm_relay::LLMError> {
/// use llm_relay::AiClient;
///
/// let client = AiClient::from_env()?;
/// let response = client
///     .request()
///     .provider("ollama")
///     .model("llama3")
///     .system_instruction("Answer in one sentence.")
///     .temperature(0.7)?
///     .prompt("What is Rust?")
///     .run()
///     .await?;
/// println!("{}", response.answer);
/// # Ok(())
/// # }
/// ```
pub struct RequestBuilder {
    registry: Arc<DriverRegistry>,
    history: Option<Arc<dyn ConversationStore>>,
    provider: String,
    model: Option<String>,
    system_instruction: Option<String>,
    temperature: Temperature,
    response_format: Option<Value>,
    stream: bool,
    user_messages: Vec<Message>,
    preview_messages: Vec<Message>,
    conversation_id: Option<String>,
}

impl RequestBuilder {
    /// Selects the provider key. Unknown keys fail at the terminal call.
    pub fn provider(mut self, key: impl Into<String>) -> Self {
        self.provider = key.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// # Errors
    ///
    /// [`LLMError::Validation`] outside `[0.1, 2.0]`.
    pub fn temperature(mut self, value: f64) -> Result<Self, LLMError> {
        self.temperature = Temperature::new(value)?;
        Ok(self)
    }

    pub fn creativity(mut self, creativity: Creativity) -> Self {
        self.temperature = creativity.temperature();
        self
    }

    /// Structured-output schema, forwarded where the vendor supports it.
    pub fn response_format(mut self, format: Value) -> Self {
        self.response_format = Some(format);
        self
    }

    /// In stream mode [`run`](Self::run) drains the vendor's streaming
    /// endpoint and returns the concatenated answer.
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Sets the user turn, replacing any earlier prompt.
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.user_messages = vec![Message::passthrough(
            Role::User.as_str().to_string(),
            Value::String(prompt.into()),
        )];
        self
    }

    /// Prior turns sent ahead of the prompt, replacing earlier previews.
    ///
    /// # Errors
    ///
    /// [`LLMError::Validation`] when a text-only batch holds an invalid entry;
    /// batches with structured content are forwarded unvalidated.
    pub fn preview_messages<I, T>(mut self, messages: I) -> Result<Self, LLMError>
    where
        I: IntoIterator<Item = T>,
        T: Into<MessageInput>,
    {
        self.preview_messages = normalize_preview_batch(messages)?;
        Ok(self)
    }

    /// Records this exchange under `conversation_id` and replays its earlier
    /// turns, when the client has a history store.
    pub fn conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Runs the request and returns the normalized response.
    ///
    /// # Errors
    ///
    /// [`LLMError::DriverNotSupported`] for an unknown provider key,
    /// [`LLMError::Validation`] when no message was supplied (checked before
    /// any I/O), [`LLMError::VendorRequest`] when the vendor call fails.
    /// History failures never surface here.
    pub async fn run(self) -> Result<AiResponse, LLMError> {
        let provider = self.registry.resolve(&self.provider)?;
        let request = self.generation_request()?;
        debug!(
            provider = %self.provider,
            model = %request.resolve_model(provider.default_model()),
            stream = request.stream,
            messages = request.messages.len(),
            "running generation"
        );

        let generation = provider.generate_response(&request).await?;
        let usage = provider.usage_data(&generation).unwrap_or_default();
        let metadata = provider.response_metadata(&generation);
        debug!(
            provider = %self.provider,
            input_tokens = ?usage.input_tokens,
            output_tokens = ?usage.output_tokens,
            "generation completed"
        );

        self.record_exchange(provider.as_ref(), &request, &generation.text);

        Ok(AiResponse {
            answer: generation.text,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            provider: self.provider,
            metadata,
        })
    }

    /// Like [`run`](Self::run) but returns only the answer text.
    pub async fn answer(self) -> Result<String, LLMError> {
        Ok(self.run().await?.answer)
    }

    /// Streams answer fragments as the vendor produces them.
    ///
    /// Streamed exchanges are not recorded in the history store.
    pub async fn stream_response(self) -> Result<TextStream, LLMError> {
        let provider = self.registry.resolve(&self.provider)?;
        let request = self.generation_request()?.with_stream_mode(true);
        debug!(
            provider = %self.provider,
            model = %request.resolve_model(provider.default_model()),
            messages = request.messages.len(),
            "opening generation stream"
        );
        provider.generate_stream_response(&request).await
    }

    /// Merges stored history, preview messages and the prompt, in that order.
    fn generation_request(&self) -> Result<GenerationRequest, LLMError> {
        if self.preview_messages.is_empty() && self.user_messages.is_empty() {
            return Err(LLMError::validation(
                "No user messages provided. Call prompt() or preview_messages() before running the request.",
            ));
        }

        let mut messages = self.stored_turns();
        messages.extend(self.preview_messages.iter().cloned());
        messages.extend(self.user_messages.iter().cloned());

        let mut request = GenerationRequest::new()
            .with_user_messages(messages)
            .with_temperature(self.temperature)
            .with_stream_mode(self.stream);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        if let Some(instruction) = &self.system_instruction {
            request = request.with_system_instruction(instruction.clone());
        }
        if let Some(format) = &self.response_format {
            request = request.with_response_format(format.clone());
        }
        Ok(request)
    }

    fn history_target(&self) -> Option<(&dyn ConversationStore, &str)> {
        match (&self.history, &self.conversation_id) {
            (Some(store), Some(id)) => Some((store.as_ref(), id.as_str())),
            _ => None,
        }
    }

    fn stored_turns(&self) -> Vec<Message> {
        let Some((store, conversation_id)) = self.history_target() else {
            return Vec::new();
        };
        match store.load_ordered(conversation_id) {
            Ok(records) => records
                .into_iter()
                .map(|record| Message::passthrough(record.role, Value::String(record.content)))
                .collect(),
            Err(err) => {
                warn!(conversation_id, error = %err, "failed to load conversation history");
                Vec::new()
            }
        }
    }

    fn record_exchange(&self, provider: &dyn LLMProvider, request: &GenerationRequest, answer: &str) {
        let Some((store, conversation_id)) = self.history_target() else {
            return;
        };
        let model = request.resolve_model(provider.default_model());
        let turns = self
            .user_messages
            .iter()
            .map(|message| (message.role_str().to_string(), content_for_history(message.content())))
            .chain(std::iter::once((
                Role::Assistant.as_str().to_string(),
                answer.to_string(),
            )));

        for (role, content) in turns {
            if let Err(err) = store.append(conversation_id, &self.provider, &model, &role, &content) {
                warn!(conversation_id, error = %err, "failed to record conversation turn");
                return;
            }
        }
    }
}

fn content_for_history(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Structured(value) => value.to_string(),
    }
}
