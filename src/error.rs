use thiserror::Error;

/// Aggregates every failure mode exposed by the relay.
///
/// Validation and driver errors are raised before any network I/O happens.
/// Vendor errors always carry the vendor key and the raw response body (or the
/// transport failure text) so callers can log or display them verbatim.
#[derive(Debug, Error)]
pub enum LLMError {
    /// Invalid role, empty content, out-of-range temperature, malformed message
    /// batch entry, or a terminal call without any message.
    #[error("invalid request: {message}")]
    Validation { message: String },
    /// The requested provider key has no registered driver.
    #[error("Driver [{driver}] not supported.")]
    DriverNotSupported { driver: String },
    /// Non-success HTTP status or transport failure reported by a vendor call.
    #[error("{vendor} API error: {message}")]
    VendorRequest {
        /// Provider key, such as `openai`.
        vendor: &'static str,
        /// HTTP status when the vendor answered at all.
        status: Option<u16>,
        /// Raw response body or transport failure text.
        message: String,
    },
    /// Transport-layer failure before a vendor qualified it.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// Conversation history store failure. Swallowed by the request pipeline.
    #[error("persistence error: {message}")]
    Persistence { message: String },
    /// Raised when building or validating configuration fails.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Name of the configuration field that failed validation.
        field: String,
        /// Additional context explaining why the field is invalid.
        reason: String,
    },
}

impl LLMError {
    /// Creates an [`LLMError::Validation`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_relay::error::LLMError;
    ///
    /// let err = LLMError::validation("Message content cannot be empty.");
    /// assert!(matches!(err, LLMError::Validation { .. }));
    /// ```
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an [`LLMError::Transport`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_relay::error::LLMError;
    ///
    /// let err = LLMError::transport("dns lookup failed");
    /// assert!(matches!(err, LLMError::Transport { .. }));
    /// ```
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an [`LLMError::VendorRequest`] for the given vendor key.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_relay::error::LLMError;
    ///
    /// let err = LLMError::vendor("openai", Some(500), "upstream exploded");
    /// assert!(matches!(err, LLMError::VendorRequest { vendor: "openai", status: Some(500), .. }));
    /// ```
    pub fn vendor<T: Into<String>>(vendor: &'static str, status: Option<u16>, message: T) -> Self {
        Self::VendorRequest {
            vendor,
            status,
            message: message.into(),
        }
    }

    /// Creates an [`LLMError::Persistence`] from a textual description.
    pub fn persistence<T: Into<String>>(message: T) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Qualifies a transport failure with the vendor that issued the call.
    ///
    /// Errors that are already vendor-qualified or are validation failures pass
    /// through untouched.
    pub(crate) fn qualify(self, vendor: &'static str) -> Self {
        match self {
            Self::Transport { message } => Self::VendorRequest {
                vendor,
                status: None,
                message,
            },
            other => other,
        }
    }
}
