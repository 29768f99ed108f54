use serde_json::{Map, Value, json};

use crate::message::Message;
use crate::types::GenerationRequest;

pub(crate) const MAX_TOKENS: u32 = 1024;

/// Builds the `/v1/messages` body.
///
/// The system instruction travels in the top-level `system` field rather
/// than as a message. `response_format` has no Messages API counterpart and
/// is not sent.
pub(crate) fn build_anthropic_body(request: &GenerationRequest, model: &str, stream: bool) -> Value {
    let mut body = Map::new();
    body.insert("model".into(), json!(model));
    body.insert("temperature".into(), json!(request.temperature.value()));
    body.insert("max_tokens".into(), json!(MAX_TOKENS));
    if let Some(system) = &request.system_instruction {
        body.insert("system".into(), json!(system));
    }
    body.insert(
        "messages".into(),
        Value::Array(request.messages.iter().map(Message::to_value).collect()),
    );
    if stream {
        body.insert("stream".into(), json!(true));
    }
    Value::Object(body)
}
