use serde_json::{Map, Value, json};

use crate::types::GenerationRequest;

/// Builds the `/api/chat` body.
///
/// Temperature sits at the top level, next to `model` and `stream`.
pub(crate) fn build_ollama_body(request: &GenerationRequest, model: &str, stream: bool) -> Value {
    let mut body = Map::new();
    body.insert("model".into(), json!(model));
    body.insert("temperature".into(), json!(request.temperature.value()));
    body.insert("stream".into(), json!(stream));
    body.insert(
        "messages".into(),
        Value::Array(request.wire_messages_with_system()),
    );
    if let Some(format) = &request.response_format {
        body.insert("format".into(), format.clone());
    }
    Value::Object(body)
}
