use std::env;

use dotenvy::dotenv;
use futures_util::StreamExt;
use llm_relay::{AiClient, ProviderKind};

fn load_env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn live_client(kind: ProviderKind) -> Option<AiClient> {
    let _ = dotenv();
    let key_var = format!("{}_API_KEY", kind.as_str().to_ascii_uppercase());
    if kind.requires_api_key() && load_env_var(&key_var).is_none() {
        eprintln!("skip live test: {key_var} missing");
        return None;
    }
    match AiClient::from_env() {
        Ok(client) => Some(client),
        Err(err) => {
            eprintln!("skip live test: {err}");
            None
        }
    }
}

#[tokio::test]
#[ignore = "requires a running Ollama server"]
async fn ollama_live_run() {
    let Some(client) = live_client(ProviderKind::Ollama) else {
        return;
    };

    let response = client
        .request()
        .provider(ProviderKind::Ollama)
        .system_instruction("Reply with a single word.")
        .prompt("Say hello.")
        .run()
        .await
        .expect("ollama request should succeed");

    assert!(!response.answer.trim().is_empty());
    assert!(response.metadata.is_some());
}

#[tokio::test]
#[ignore = "requires OPENAI_API_KEY"]
async fn openai_live_run_and_stream() {
    let Some(client) = live_client(ProviderKind::OpenAi) else {
        return;
    };

    let response = client
        .request()
        .provider(ProviderKind::OpenAi)
        .prompt("Please introduce Rust language in one sentence.")
        .run()
        .await
        .expect("openai request should succeed");
    assert!(response.answer.contains("Rust"), "{}", response.answer);
    assert!(response.input_tokens.is_some());

    let mut stream = client
        .request()
        .provider(ProviderKind::OpenAi)
        .prompt("Count from 1 to 5.")
        .stream_response()
        .await
        .expect("stream should open");
    let mut text = String::new();
    while let Some(fragment) = stream.next().await {
        text.push_str(&fragment.expect("fragment"));
    }
    assert!(text.contains('5'), "{text}");
}

#[tokio::test]
#[ignore = "requires ANTHROPIC_API_KEY"]
async fn anthropic_live_run() {
    let Some(client) = live_client(ProviderKind::Anthropic) else {
        return;
    };

    let response = client
        .request()
        .provider(ProviderKind::Anthropic)
        .system_instruction("You are concise.")
        .prompt("What is 2 + 2? Answer with the number only.")
        .run()
        .await
        .expect("anthropic request should succeed");

    assert!(response.answer.contains('4'), "{}", response.answer);
    assert!(response.output_tokens.is_some());
}
