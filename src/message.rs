//! Validated chat turns.
//!
//! A [`Message`] pairs a [`Role`] with content. Scalar text content is
//! validated on construction. Entries of a multimodal preview batch are kept
//! as their original JSON objects and sent back out unchanged.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::LLMError;

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::System, Role::User, Role::Assistant];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LLMError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == value)
            .ok_or_else(|| {
                LLMError::validation(format!(
                    "Invalid role '{value}'. Valid roles are: system, user, assistant"
                ))
            })
    }
}

/// Content of a chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text; never empty once validated.
    Text(String),
    /// Vendor-shaped multimodal payload forwarded untouched.
    Structured(Value),
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Structured(_) => None,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            MessageContent::Text(text) => Value::String(text.clone()),
            MessageContent::Structured(value) => value.clone(),
        }
    }
}

/// One chat turn.
///
/// # Examples
///
/// ```
/// use llm_relay::message::{Message, Role};
///
/// let message = Message::user("Hello").unwrap();
/// assert_eq!(message.role(), Some(Role::User));
/// assert_eq!(message.text(), Some("Hello"));
///
/// assert!(Message::new("robot", "Hello").is_err());
/// assert!(Message::assistant("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    role: String,
    content: MessageContent,
    /// Original object of a passthrough entry, emitted as-is on the wire.
    verbatim: Option<Map<String, Value>>,
}

impl Message {
    /// Builds a validated text message.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Validation`] when `role` is not one of `system`,
    /// `user`, `assistant`, or when `content` is empty or whitespace-only.
    pub fn new(role: &str, content: impl Into<String>) -> Result<Self, LLMError> {
        let role: Role = role.parse()?;
        Self::with_role(role, content)
    }

    /// Builds a validated text message from an already typed role.
    pub fn with_role(role: Role, content: impl Into<String>) -> Result<Self, LLMError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(LLMError::validation("Message content cannot be empty."));
        }
        Ok(Self {
            role: role.as_str().to_string(),
            content: MessageContent::Text(content),
            verbatim: None,
        })
    }

    pub fn system(content: impl Into<String>) -> Result<Self, LLMError> {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Result<Self, LLMError> {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Result<Self, LLMError> {
        Self::with_role(Role::Assistant, content)
    }

    /// Carries a raw entry of a multimodal batch without validation.
    pub(crate) fn passthrough(role: String, content: Value) -> Self {
        let content = match content {
            Value::String(text) => MessageContent::Text(text),
            other => MessageContent::Structured(other),
        };
        Self {
            role,
            content,
            verbatim: None,
        }
    }

    /// Keeps a raw batch entry whole, sibling keys included.
    pub(crate) fn verbatim(object: Map<String, Value>) -> Self {
        let role = match object.get("role") {
            Some(Value::String(role)) => role.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let content = match object.get("content") {
            Some(Value::String(text)) => MessageContent::Text(text.clone()),
            Some(other) => MessageContent::Structured(other.clone()),
            None => MessageContent::Structured(Value::Null),
        };
        Self {
            role,
            content,
            verbatim: Some(object),
        }
    }

    /// Typed role, `None` only for unvalidated passthrough entries.
    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }

    /// Role string as it will be sent on the wire.
    pub fn role_str(&self) -> &str {
        &self.role
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    /// Text content, `None` for structured content.
    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }

    /// Wire form `{"role": …, "content": …}`, or the untouched original
    /// object for passthrough entries.
    pub fn to_value(&self) -> Value {
        match &self.verbatim {
            Some(object) => Value::Object(object.clone()),
            None => json!({ "role": self.role, "content": self.content.to_value() }),
        }
    }

    /// Validates a heterogeneous batch of raw maps and messages.
    ///
    /// The whole batch fails on the first invalid entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_relay::message::{Message, MessageInput};
    /// use serde_json::json;
    ///
    /// let raw = vec![
    ///     json!({"role": "user", "content": "Hello, what is your name?"}),
    ///     json!({"role": "assistant", "content": "I am an assistant."}),
    /// ];
    /// let messages = Message::from_array(raw.clone()).unwrap();
    /// assert_eq!(Message::to_array(&messages), raw);
    ///
    /// let mixed: Vec<MessageInput> = vec![
    ///     json!({"role": "user", "content": "Hi"}).into(),
    ///     Message::assistant("Hello!").unwrap().into(),
    /// ];
    /// assert_eq!(Message::from_array(mixed).unwrap().len(), 2);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Validation`] for entries that are not objects, lack
    /// `role`/`content`, carry non-string values, or fail [`Message::new`].
    pub fn from_array<I, T>(messages: I) -> Result<Vec<Message>, LLMError>
    where
        I: IntoIterator<Item = T>,
        T: Into<MessageInput>,
    {
        messages
            .into_iter()
            .map(|input| match input.into() {
                MessageInput::Message(message) => Ok(message),
                MessageInput::Raw(value) => Self::from_raw(&value),
            })
            .collect()
    }

    /// Converts messages back into their wire form, preserving order.
    pub fn to_array(messages: &[Message]) -> Vec<Value> {
        messages.iter().map(Message::to_value).collect()
    }

    fn from_raw(value: &Value) -> Result<Message, LLMError> {
        let object = value.as_object().ok_or_else(|| {
            LLMError::validation(
                "Each message must be an object with \"role\" and \"content\" keys or a Message instance.",
            )
        })?;
        let (role, content) = match (object.get("role"), object.get("content")) {
            (Some(role), Some(content)) => (role, content),
            _ => {
                return Err(LLMError::validation(
                    "Each message must have \"role\" and \"content\" keys.",
                ));
            }
        };
        match (role.as_str(), content.as_str()) {
            (Some(role), Some(content)) => Message::new(role, content),
            _ => Err(LLMError::validation(
                "Message \"role\" and \"content\" must be strings.",
            )),
        }
    }
}

impl Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

/// One entry of a message batch: a raw JSON map or an already built message.
#[derive(Debug, Clone)]
pub enum MessageInput {
    Raw(Value),
    Message(Message),
}

impl MessageInput {
    fn has_structured_content(&self) -> bool {
        match self {
            MessageInput::Raw(value) => value
                .get("content")
                .is_some_and(|content| content.is_array() || content.is_object()),
            MessageInput::Message(message) => {
                matches!(message.content, MessageContent::Structured(_))
            }
        }
    }
}

impl From<Value> for MessageInput {
    fn from(value: Value) -> Self {
        MessageInput::Raw(value)
    }
}

impl From<Map<String, Value>> for MessageInput {
    fn from(map: Map<String, Value>) -> Self {
        MessageInput::Raw(Value::Object(map))
    }
}

impl From<Message> for MessageInput {
    fn from(message: Message) -> Self {
        MessageInput::Message(message)
    }
}

/// Normalizes a batch of preview messages.
///
/// When any entry carries structured (multimodal) content the whole batch is
/// passed through verbatim and validation is skipped for every entry;
/// otherwise the batch goes through [`Message::from_array`].
pub(crate) fn normalize_preview_batch<I, T>(messages: I) -> Result<Vec<Message>, LLMError>
where
    I: IntoIterator<Item = T>,
    T: Into<MessageInput>,
{
    let inputs: Vec<MessageInput> = messages.into_iter().map(Into::into).collect();
    if !inputs.iter().any(MessageInput::has_structured_content) {
        return Message::from_array(inputs);
    }

    inputs
        .into_iter()
        .map(|input| match input {
            MessageInput::Message(message) => Ok(message),
            MessageInput::Raw(Value::Object(object)) => Ok(Message::verbatim(object)),
            MessageInput::Raw(_) => Err(LLMError::validation(
                "Each message must be an object with \"role\" and \"content\" keys or a Message instance.",
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_roles_outside_the_allowed_set() {
        for role in ["", "tool", "developer", "User", "SYSTEM", "bot"] {
            let err = Message::new(role, "hello").expect_err("role should be rejected");
            match err {
                LLMError::Validation { message } => {
                    assert!(message.contains("Invalid role"), "{message}");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_blank_text_content() {
        for content in ["", " ", "\n\t", "   \r\n"] {
            assert!(matches!(
                Message::user(content),
                Err(LLMError::Validation { .. })
            ));
        }
    }

    #[test]
    fn factories_tag_roles() {
        assert_eq!(Message::system("s").unwrap().role(), Some(Role::System));
        assert_eq!(Message::user("u").unwrap().role(), Some(Role::User));
        assert_eq!(
            Message::assistant("a").unwrap().role(),
            Some(Role::Assistant)
        );
    }

    #[test]
    fn from_array_fails_the_whole_batch_on_first_invalid_entry() {
        let raw = vec![
            json!({"role": "user", "content": "fine"}),
            json!({"role": "user"}),
            json!({"role": "wizard", "content": "never reached"}),
        ];
        let err = Message::from_array(raw).expect_err("batch should fail");
        match err {
            LLMError::Validation { message } => {
                assert!(message.contains("\"role\" and \"content\" keys"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn from_array_rejects_non_object_entries() {
        let err = Message::from_array(vec![json!("just a string")]).expect_err("should fail");
        assert!(matches!(err, LLMError::Validation { .. }));
    }

    #[test]
    fn round_trip_reproduces_raw_batch() {
        let raw = vec![
            json!({"role": "system", "content": "Be brief."}),
            json!({"role": "user", "content": "Hello, what is your name?"}),
            json!({"role": "assistant", "content": "My name is Relay."}),
            json!({"role": "user", "content": "What can you help me with?"}),
        ];
        let messages = Message::from_array(raw.clone()).expect("valid batch");
        assert_eq!(Message::to_array(&messages), raw);
    }

    #[test]
    fn preview_batch_with_structured_content_passes_through_verbatim() {
        let parts = json!([
            {"type": "text", "text": "What is in this image?"},
            {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
        ]);
        let raw = vec![
            json!({"role": "user", "content": parts.clone()}),
            // Would fail validation on its own; the batch switch skips it.
            json!({"role": "assistant", "content": "   "}),
        ];
        let messages = normalize_preview_batch(raw).expect("passthrough");
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0].content(),
            &MessageContent::Structured(parts)
        );
        assert_eq!(messages[1].text(), Some("   "));
    }

    #[test]
    fn preview_batch_passthrough_keeps_sibling_keys_and_missing_roles() {
        let raw = vec![
            json!({"role": "user", "content": [{"type": "text", "text": "Compare these."}]}),
            json!({"role": "user", "content": "this one", "images": ["aGVsbG8="], "name": "ana"}),
            json!({"content": [{"type": "text", "text": "no role here"}]}),
        ];
        let messages = normalize_preview_batch(raw.clone()).expect("passthrough");
        assert_eq!(Message::to_array(&messages), raw);
        assert_eq!(messages[1].text(), Some("this one"));
        assert_eq!(messages[2].role(), None);
    }

    #[test]
    fn preview_batch_without_structured_content_is_validated() {
        let raw = vec![
            json!({"role": "user", "content": "ok"}),
            json!({"role": "assistant", "content": ""}),
        ];
        assert!(matches!(
            normalize_preview_batch(raw),
            Err(LLMError::Validation { .. })
        ));
    }

    #[test]
    fn message_serializes_to_wire_form() {
        let message = Message::user("Hello").unwrap();
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"role": "user", "content": "Hello"})
        );
    }
}
