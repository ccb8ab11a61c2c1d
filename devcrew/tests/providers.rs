//! Provider clients and the full run against mocked provider APIs.

use mockito::Matcher;
use serde_json::json;

use devcrew::llm::{AnthropicClient, ChatModel, GoogleClient, OpenAiClient};
use devcrew::output::Console;
use devcrew::settings::{ApiKey, Provider, Settings};
use devcrew::PipelineError;

const PLAN: &str = "1. GET /todos returns []\nTests:\n1. GET /todos -> 200";
const CODE: &str = "from fastapi import FastAPI\napp = FastAPI()\n";

fn anthropic_reply(text: &str) -> String {
    json!({
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 10, "output_tokens": 20}
    })
    .to_string()
}

fn openai_reply(text: &str) -> String {
    json!({
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }]
    })
    .to_string()
}

fn gemini_reply(text: &str) -> String {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
    .to_string()
}

#[tokio::test]
async fn anthropic_client_sends_key_and_system_prompt() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "sk-ant")
        .match_header("anthropic-version", "2023-06-01")
        .match_body(Matcher::PartialJson(json!({
            "model": "claude-test",
            "system": "be an architect",
            "messages": [{"role": "user", "content": "the goal"}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(anthropic_reply("the plan"))
        .create_async()
        .await;

    let client = AnthropicClient::new(ApiKey::new("sk-ant"))
        .unwrap()
        .with_model("claude-test")
        .with_base_url(&server.url());
    let text = client.complete("be an architect", "the goal").await.unwrap();

    assert_eq!(text, "the plan");
    mock.assert_async().await;
}

#[tokio::test]
async fn openai_client_uses_bearer_auth() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-oai")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-test",
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "hello"}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(openai_reply("hi there"))
        .create_async()
        .await;

    let client = OpenAiClient::new(ApiKey::new("sk-oai"))
        .unwrap()
        .with_model("gpt-test")
        .with_base_url(&server.url());
    assert_eq!(client.complete("sys", "hello").await.unwrap(), "hi there");
    mock.assert_async().await;
}

#[tokio::test]
async fn google_client_sends_key_in_header() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Regex(r"^/models/gemini-test:generateContent".into()))
        .match_header("x-goog-api-key", "g-key")
        .match_body(Matcher::PartialJson(json!({
            "contents": [{"role": "user", "parts": [{"text": "hello"}]}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_reply("hi"))
        .create_async()
        .await;

    let client = GoogleClient::new(ApiKey::new("g-key"))
        .unwrap()
        .with_model("gemini-test")
        .with_base_url(&server.url());
    assert_eq!(client.complete("sys", "hello").await.unwrap(), "hi");
    mock.assert_async().await;
}

#[tokio::test]
async fn google_key_stays_out_of_error_text() {
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let client = GoogleClient::new(ApiKey::new("SECRET-GKEY-123"))
        .unwrap()
        .with_base_url(&format!("http://127.0.0.1:{port}"));

    let err = client.complete("sys", "hello").await.unwrap_err();
    let msg = format!("{err:#} {err:?}");
    assert!(msg.contains("Gemini"), "{msg}");
    assert!(!msg.contains("SECRET-GKEY-123"), "{msg}");
}

#[tokio::test]
async fn api_error_status_is_surfaced() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(429)
        .with_body(r#"{"error": {"message": "rate limited"}}"#)
        .create_async()
        .await;

    let client = OpenAiClient::new(ApiKey::new("k"))
        .unwrap()
        .with_base_url(&server.url());
    let err = client.complete("sys", "hello").await.unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("429"), "{msg}");
    assert!(msg.contains("rate limited"), "{msg}");
}

fn settings_for(project: &std::path::Path, anthropic: &str, google: &str, openai: &str) -> Settings {
    let toml = format!(
        r#"
[roles]
architect = "anthropic"
developer = "google"
tester = "openai"

[base_urls]
anthropic = "{anthropic}"
google = "{google}"
openai = "{openai}"

[project]
base_path = "{}"
file_name = "main.py"

[syntax_check]
enabled = false
"#,
        project.display()
    );
    Settings::from_toml_str(&toml).unwrap()
}

#[tokio::test]
async fn full_run_routes_each_role_to_its_provider() {
    let dir = tempfile::tempdir().unwrap();
    let mut anthropic = mockito::Server::new_async().await;
    let mut google = mockito::Server::new_async().await;
    let mut openai = mockito::Server::new_async().await;

    let architect = anthropic
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "a-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(anthropic_reply(PLAN))
        .expect(1)
        .create_async()
        .await;
    // The developer must be prompted with the architect's text unchanged.
    let developer = google
        .mock("POST", Matcher::Regex(r"^/models/.+:generateContent".into()))
        .match_header("x-goog-api-key", "g-key")
        .match_body(Matcher::PartialJson(json!({
            "contents": [{"role": "user", "parts": [{"text": PLAN}]}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_reply(&format!("```python\n{CODE}```")))
        .expect(1)
        .create_async()
        .await;
    let tester = openai
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let settings = settings_for(dir.path(), &anthropic.url(), &google.url(), &openai.url());
    let env = |name: &str| match name {
        "ANTHROPIC_API_KEY" => Some("a-key".to_string()),
        "GOOGLE_API_KEY" => Some("g-key".to_string()),
        "OPENAI_API_KEY" => Some("o-key".to_string()),
        _ => None,
    };

    let outcome = devcrew::run(&settings, env, "Build a to-do API", Console::sink())
        .await
        .unwrap();

    assert_eq!(outcome.output.path, dir.path().join("main.py"));
    assert_eq!(std::fs::read_to_string(dir.path().join("main.py")).unwrap(), CODE);
    architect.assert_async().await;
    developer.assert_async().await;
    tester.assert_async().await;
}

#[tokio::test]
async fn missing_key_fails_before_any_provider_call() {
    let dir = tempfile::tempdir().unwrap();
    let mut anthropic = mockito::Server::new_async().await;
    let mut google = mockito::Server::new_async().await;
    let mut openai = mockito::Server::new_async().await;
    let mut untouched = Vec::new();
    for server in [&mut anthropic, &mut google, &mut openai] {
        untouched.push(server.mock("POST", Matcher::Any).expect(0).create_async().await);
    }

    let settings = settings_for(dir.path(), &anthropic.url(), &google.url(), &openai.url());
    let env = |name: &str| match name {
        "ANTHROPIC_API_KEY" => Some("a-key".to_string()),
        "OPENAI_API_KEY" => Some("o-key".to_string()),
        _ => None,
    };

    let err = devcrew::run(&settings, env, "Build a to-do API", Console::sink())
        .await
        .unwrap_err();

    match err {
        PipelineError::Configuration(msg) => {
            assert!(msg.contains(Provider::Google.key_var()), "{msg}");
            assert!(msg.contains("developer"), "{msg}");
        }
        other => panic!("expected configuration error, got {other:?}"),
    }
    for mock in untouched {
        mock.assert_async().await;
    }
    assert!(!dir.path().join("main.py").exists());
}
