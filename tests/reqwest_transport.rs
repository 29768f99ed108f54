use std::sync::Arc;
use std::time::Duration;

use llm_relay::config::ProviderConfig;
use llm_relay::http::reqwest::{ReqwestTransport, default_dyn_transport};
use llm_relay::{AiClient, AiConfig, LLMError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(kind: &str, settings: ProviderConfig) -> AiClient {
    let mut config = AiConfig::default();
    config.providers.insert(kind.to_string(), settings);
    AiClient::from_config(&config, default_dyn_transport().expect("reqwest client"))
}

#[tokio::test]
async fn ollama_round_trip_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama3", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3",
            "message": {"role": "assistant", "content": "Hi there"},
            "done": true,
            "done_reason": "stop"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for("ollama", ProviderConfig::default().with_base_url(server.uri()));
    let response = client.request().prompt("Hello").run().await.unwrap();

    assert_eq!(response.answer, "Hi there");
    assert_eq!(response.finish_reason(), Some("stop"));
}

#[tokio::test]
async fn non_success_status_keeps_raw_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-bad"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string(r#"{"error":{"message":"Incorrect API key provided","code":"invalid_api_key"}}"#),
        )
        .mount(&server)
        .await;

    let client = client_for(
        "openai",
        ProviderConfig::default()
            .with_api_key("sk-bad")
            .with_base_url(format!("{}/v1", server.uri())),
    );
    let err = client
        .request()
        .provider("openai")
        .prompt("Hello")
        .run()
        .await
        .unwrap_err();

    match err {
        LLMError::VendorRequest { vendor, status, message } => {
            assert_eq!(vendor, "openai");
            assert_eq!(status, Some(401));
            assert!(message.contains("invalid_api_key"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn slow_vendor_hits_the_configured_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"content": [{"type": "text", "text": "late"}]}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = client_for(
        "anthropic",
        ProviderConfig::default()
            .with_api_key("ak")
            .with_base_url(server.uri())
            .with_timeout_secs(1),
    );
    let err = client
        .request()
        .provider("anthropic")
        .prompt("Hello")
        .run()
        .await
        .unwrap_err();

    match err {
        LLMError::VendorRequest { vendor, status, message } => {
            assert_eq!(vendor, "anthropic");
            assert_eq!(status, None);
            assert!(message.contains("timed out"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn sse_body_streams_over_http() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let mut config = AiConfig::default();
    config.providers.insert(
        "together".to_string(),
        ProviderConfig::default()
            .with_api_key("tk")
            .with_base_url(format!("{}/v1", server.uri())),
    );
    let transport = Arc::new(ReqwestTransport::default_client().unwrap());
    let client = AiClient::from_config(&config, transport);

    let answer = client
        .request()
        .provider("together")
        .stream(true)
        .prompt("Hello")
        .answer()
        .await
        .unwrap();

    assert_eq!(answer, "Hi there");
}
