use serde_json::{Map, Value, json};

use crate::types::GenerationRequest;

use super::vendor::ChatCompletionVendor;

pub(crate) fn build_chat_body(
    vendor: ChatCompletionVendor,
    request: &GenerationRequest,
    model: &str,
    stream: bool,
) -> Value {
    let mut body = Map::new();
    body.insert("model".into(), json!(model));
    body.insert("temperature".into(), json!(request.temperature.value()));
    for (key, value) in vendor.sampling_extras() {
        body.insert(key.into(), value);
    }
    body.insert(
        "messages".into(),
        Value::Array(request.wire_messages_with_system()),
    );
    if let Some(format) = &request.response_format {
        body.insert("response_format".into(), format.clone());
    }
    if stream {
        body.insert("stream".into(), json!(true));
    }
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    fn request() -> GenerationRequest {
        GenerationRequest::new()
            .with_system_instruction("Be terse.")
            .with_user_messages(vec![Message::user("Hi").unwrap()])
    }

    #[test]
    fn openai_body_has_no_extras() {
        let body = build_chat_body(ChatCompletionVendor::OpenAi, &request(), "gpt-4o", false);
        assert_eq!(
            body,
            json!({
                "model": "gpt-4o",
                "temperature": 1.0,
                "messages": [
                    {"role": "system", "content": "Be terse."},
                    {"role": "user", "content": "Hi"}
                ]
            })
        );
    }

    #[test]
    fn novita_body_carries_sampling_extras_and_stream_flag() {
        let body = build_chat_body(ChatCompletionVendor::Novita, &request(), "deepseek/deepseek-v3-0324", true);
        assert_eq!(body["top_k"], json!(50));
        assert_eq!(body["repetition_penalty"], json!(1));
        assert_eq!(body["min_p"], json!(0));
        assert_eq!(body["stream"], json!(true));
    }

    #[test]
    fn response_format_is_forwarded_verbatim() {
        let format = json!({"type": "json_schema", "json_schema": {"name": "x", "schema": {"type": "object"}}});
        let body = build_chat_body(
            ChatCompletionVendor::Together,
            &request().with_response_format(format.clone()),
            "m",
            false,
        );
        assert_eq!(body["response_format"], format);
        assert!(body.get("top_p").is_none());
    }
}
