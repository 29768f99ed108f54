use serde::Deserialize;
use serde_json::Value;

use crate::error::LLMError;

/// Builds the vendor-qualified error for a non-success HTTP response.
///
/// The vendor's human-readable message is pulled out of the common error
/// shapes when possible; the raw body is always kept.
pub(crate) fn vendor_error(vendor: &'static str, status: u16, body: &str) -> LLMError {
    let message = match extract_error_message(body) {
        Some(detail) => format!("status {status}: {detail} | body: {body}"),
        None => format!("status {status}: {body}"),
    };
    LLMError::vendor(vendor, Some(status), message)
}

fn extract_error_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<Value>,
        message: Option<Value>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.error {
        Some(Value::String(message)) => return Some(message),
        Some(Value::Object(inner)) => {
            if let Some(Value::String(message)) = inner.get("message") {
                return Some(match inner.get("code").or_else(|| inner.get("type")) {
                    Some(Value::String(code)) => format!("{message} ({code})"),
                    Some(Value::Number(code)) => format!("{message} ({code})"),
                    _ => message.clone(),
                });
            }
        }
        _ => {}
    }
    match parsed.message {
        Some(Value::String(message)) => Some(message),
        _ => None,
    }
}
