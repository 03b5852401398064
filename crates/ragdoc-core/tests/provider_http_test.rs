//! Wire-level tests for the HTTP providers against a local mock server

mod common;

use common::{MockResponse, MockServer};
use futures::{StreamExt, TryStreamExt};
use ragdoc_core::config::{EmbeddingConfig, LLMConfig};
use ragdoc_core::llm::{
    GoogleProvider, OllamaEmbeddingProvider, OllamaProvider, OpenAICompatibleProvider,
    OpenAIEmbeddingProvider,
};
use ragdoc_core::{EmbeddingProvider, LanguageModelProvider, Message, RagError};
use serde_json::json;
use std::time::Duration;

const UNREACHABLE: &str = "http://127.0.0.1:1";

fn prompt() -> Vec<Message> {
    vec![Message::system("be brief"), Message::user("hello")]
}

#[tokio::test]
async fn test_ollama_embeddings_keep_input_order() {
    // Earlier prompts answer later, so completion order is reversed
    let server = MockServer::start(|req| {
        let prompt = req.json()["prompt"].as_str().unwrap_or("").to_string();
        let n: f32 = prompt.trim_start_matches("text-").parse().unwrap_or(-1.0);
        let delay = Duration::from_millis(((5.0 - n) * 30.0) as u64);
        MockResponse::json(json!({ "embedding": [n, 1.0, 0.0] })).delayed(delay)
    })
    .await;

    // Unknown models take their dimension from the config
    let provider = OllamaEmbeddingProvider::new(
        &EmbeddingConfig::new("ollama", "tiny-embed")
            .with_dimension(3)
            .with_base_url(&server.base_url),
    )
    .unwrap();
    assert_eq!(provider.dimension(), 3);

    let texts: Vec<String> = (0..5).map(|i| format!("text-{}", i)).collect();
    let vectors = provider.embed_documents(&texts).await.unwrap();

    let firsts: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
    assert_eq!(firsts, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    assert_eq!(server.requests().len(), 5);
    assert!(server
        .requests()
        .iter()
        .all(|r| r.path == "/api/embeddings" && r.json()["model"] == "tiny-embed"));
}

#[tokio::test]
async fn test_embedding_length_must_match_dimension() {
    let server =
        MockServer::start(|_| MockResponse::json(json!({ "embedding": [0.1, 0.2, 0.3] }))).await;

    let known = OllamaEmbeddingProvider::new(
        &EmbeddingConfig::new("ollama", "nomic-embed-text").with_base_url(&server.base_url),
    )
    .unwrap();
    assert_eq!(known.dimension(), 768);
    match known.embed_query("hello").await {
        Err(RagError::Provider { provider, message }) => {
            assert_eq!(provider, "ollama");
            assert!(message.contains("expected 768"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(known
        .embed_documents(&["a".to_string(), "b".to_string()])
        .await
        .is_err());

    let matching = OllamaEmbeddingProvider::new(
        &EmbeddingConfig::new("ollama", "tiny-embed")
            .with_dimension(3)
            .with_base_url(&server.base_url),
    )
    .unwrap();
    let vector = matching.embed_query("hello").await.unwrap();
    assert_eq!(vector.len(), matching.dimension());
}

#[tokio::test]
async fn test_dropping_stream_releases_connection() {
    let server = MockServer::start(|_| {
        let parts = (0..500)
            .map(|i| format!("{}\n", json!({ "message": { "content": format!("tok{} ", i) }, "done": false })))
            .collect();
        MockResponse::trickle("application/x-ndjson", parts, Duration::from_millis(20))
    })
    .await;

    let provider =
        OllamaProvider::new(&LLMConfig::new("ollama", "llama3").with_base_url(&server.base_url))
            .unwrap();
    let mut stream = provider.generate_stream(&prompt()).await.unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first, "tok0 ");
    drop(stream);

    let released = tokio::time::timeout(Duration::from_secs(5), async {
        while server.hangups() == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "server kept writing to a dropped stream");
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_ollama_chat_maps_options_and_usage() {
    let server = MockServer::start(|_| {
        MockResponse::json(json!({
            "model": "llama3",
            "message": { "role": "assistant", "content": "Hi there" },
            "done": true,
            "prompt_eval_count": 12,
            "eval_count": 3
        }))
    })
    .await;

    let config = LLMConfig::new("ollama", "llama3")
        .with_base_url(&server.base_url)
        .with_temperature(0.2)
        .with_max_tokens(64);
    let result = OllamaProvider::new(&config)
        .unwrap()
        .generate(&prompt())
        .await
        .unwrap();

    assert_eq!(result.text, "Hi there");
    assert_eq!(result.usage.map(|u| u.total_tokens), Some(15));

    let body = server.requests()[0].json();
    assert_eq!(body["stream"], false);
    assert_eq!(body["options"]["num_predict"], 64);
    assert_eq!(body["messages"][0]["role"], "system");
}

#[tokio::test]
async fn test_ollama_stream_stops_at_done() {
    let server = MockServer::start(|_| {
        let lines = [
            json!({ "message": { "content": "Hel" }, "done": false }),
            json!({ "message": { "content": "lo" }, "done": false }),
            json!({ "message": { "content": "" }, "done": true }),
            json!({ "message": { "content": "IGNORED" }, "done": false }),
        ];
        let body: String = lines.iter().map(|l| format!("{}\n", l)).collect();
        MockResponse::text(200, "application/x-ndjson", body)
    })
    .await;

    let provider =
        OllamaProvider::new(&LLMConfig::new("ollama", "llama3").with_base_url(&server.base_url))
            .unwrap();
    let fragments: Vec<String> = provider
        .generate_stream(&prompt())
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(fragments, vec!["Hel", "lo"]);
}

#[tokio::test]
async fn test_ollama_catalogue_filters_and_falls_back() {
    let server = MockServer::start(|_| {
        MockResponse::json(json!({
            "models": [{ "name": "llama3:latest" }, { "name": "nomic-embed-text:latest" }]
        }))
    })
    .await;

    let embed = OllamaEmbeddingProvider::new(
        &EmbeddingConfig::new("ollama", "nomic-embed-text").with_base_url(&server.base_url),
    )
    .unwrap();
    assert_eq!(embed.available_models().await, vec!["nomic-embed-text:latest"]);
    assert!(embed.health_check().await);

    let offline =
        OllamaProvider::new(&LLMConfig::new("ollama", "llama3").with_base_url(UNREACHABLE))
            .unwrap();
    assert!(!offline.health_check().await);
    assert!(offline.available_models().await.contains(&"mistral".to_string()));
}

#[tokio::test]
async fn test_openai_chat_parses_response_and_sends_key() {
    let server = MockServer::start(|_| {
        MockResponse::json(json!({
            "model": "gpt-4o-mini-2024",
            "choices": [{ "message": { "role": "assistant", "content": "Answer" } }],
            "usage": { "prompt_tokens": 5, "completion_tokens": 1, "total_tokens": 6 }
        }))
    })
    .await;

    let config = LLMConfig::new("openai", "gpt-4o-mini")
        .with_api_key("sk-test")
        .with_base_url(&server.base_url);
    let result = OpenAICompatibleProvider::openai(&config)
        .unwrap()
        .generate(&prompt())
        .await
        .unwrap();

    assert_eq!(result.text, "Answer");
    assert_eq!(result.model, "gpt-4o-mini-2024");
    assert_eq!(result.usage.map(|u| u.total_tokens), Some(6));

    let request = &server.requests()[0];
    assert_eq!(request.path, "/chat/completions");
    assert!(request.headers.contains("authorization: bearer sk-test"));
    assert_eq!(request.json()["messages"][1]["content"], "hello");
}

#[tokio::test]
async fn test_openai_without_key_is_config_error() {
    let provider =
        OpenAICompatibleProvider::openai(&LLMConfig::new("openai", "gpt-4o-mini")).unwrap();
    assert!(matches!(
        provider.generate(&prompt()).await,
        Err(RagError::Config(_))
    ));
    assert!(!provider.health_check().await);
}

#[tokio::test]
async fn test_openai_sse_stream() {
    let server = MockServer::start(|_| {
        let body = [
            r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#,
            ": keep-alive",
            r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#,
            "data:{\"choices\":[{\"delta\":{\"content\":\", world\"}}]}",
            "data: [DONE]",
            r#"data: {"choices":[{"delta":{"content":"late"}}]}"#,
        ]
        .iter()
        .map(|event| format!("{}\n\n", event))
        .collect::<String>();
        MockResponse::text(200, "text/event-stream", body)
    })
    .await;

    let config = LLMConfig::new("xai", "grok-2")
        .with_api_key("xai-key")
        .with_base_url(&server.base_url);
    let fragments: Vec<String> = OpenAICompatibleProvider::xai(&config)
        .unwrap()
        .generate_stream(&prompt())
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(fragments, vec!["Hello", ", world"]);
    assert_eq!(server.requests()[0].json()["stream"], true);
}

#[tokio::test]
async fn test_error_status_carries_body() {
    let server =
        MockServer::start(|_| MockResponse::text(500, "text/plain", "model exploded")).await;

    let config = LLMConfig::new("openai", "gpt-4o")
        .with_api_key("sk-test")
        .with_base_url(&server.base_url);
    let err = OpenAICompatibleProvider::openai(&config)
        .unwrap()
        .generate(&prompt())
        .await
        .unwrap_err();

    match err {
        RagError::Provider { provider, message } => {
            assert_eq!(provider, "openai");
            assert!(message.contains("500"));
            assert!(message.contains("model exploded"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_lmstudio_catalogue_and_health() {
    let server = MockServer::start(|_| {
        MockResponse::json(json!({ "data": [{ "id": "qwen2.5-7b" }, { "id": "phi-3" }] }))
    })
    .await;

    let provider = OpenAICompatibleProvider::lmstudio(
        &LLMConfig::new("lmstudio", "qwen2.5-7b").with_base_url(&server.base_url),
    )
    .unwrap();
    assert_eq!(provider.available_models().await, vec!["qwen2.5-7b", "phi-3"]);
    assert!(provider.health_check().await);
    assert!(server.requests()[0]
        .headers
        .contains("authorization: bearer lm-studio"));

    let offline = OpenAICompatibleProvider::lmstudio(
        &LLMConfig::new("lmstudio", "any").with_base_url(UNREACHABLE),
    )
    .unwrap();
    assert!(offline.available_models().await.is_empty());
    assert!(!offline.health_check().await);
}

#[tokio::test]
async fn test_openai_embeddings_reordered_by_index() {
    let server = MockServer::start(|_| {
        MockResponse::json(json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        }))
    })
    .await;

    let provider = OpenAIEmbeddingProvider::new(
        &EmbeddingConfig::new("openai", "custom-embedding")
            .with_dimension(2)
            .with_api_key("sk-test")
            .with_base_url(&server.base_url),
    )
    .unwrap();
    assert_eq!(provider.dimension(), 2);

    let vectors = provider
        .embed_documents(&["first".to_string(), "second".to_string()])
        .await
        .unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    assert_eq!(server.requests()[0].json()["input"], json!(["first", "second"]));

    assert!(provider.embed_documents(&[]).await.unwrap().is_empty());
    assert_eq!(server.requests().len(), 1);

    let large = OpenAIEmbeddingProvider::new(
        &EmbeddingConfig::new("openai", "text-embedding-3-small")
            .with_api_key("sk-test")
            .with_base_url(&server.base_url),
    )
    .unwrap();
    assert_eq!(large.dimension(), 1536);
    assert!(matches!(
        large.embed_documents(&["first".to_string(), "second".to_string()]).await,
        Err(RagError::Provider { .. })
    ));
}

#[tokio::test]
async fn test_google_request_shape() {
    let server = MockServer::start(|_| {
        MockResponse::json(json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": "Bonjour" }] } }],
            "usageMetadata": { "promptTokenCount": 4, "candidatesTokenCount": 1, "totalTokenCount": 5 }
        }))
    })
    .await;

    let config = LLMConfig::new("google", "gemini-1.5-flash")
        .with_api_key("g-key")
        .with_base_url(&server.base_url);
    let messages = vec![
        Message::system("translate"),
        Message::user("hello"),
        Message::assistant("bonjour"),
        Message::user("again"),
    ];
    let result = GoogleProvider::new(&config)
        .unwrap()
        .generate(&messages)
        .await
        .unwrap();
    assert_eq!(result.text, "Bonjour");

    let request = &server.requests()[0];
    assert!(request
        .path
        .starts_with("/models/gemini-1.5-flash:generateContent"));
    assert!(request.path.contains("key=g-key"));

    let body = request.json();
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "translate");
    assert_eq!(body["contents"].as_array().map(|c| c.len()), Some(3));
    assert_eq!(body["contents"][1]["role"], "model");
}

#[tokio::test]
async fn test_google_sse_stream() {
    let server = MockServer::start(|_| {
        let body = ["Bon", "jour"]
            .iter()
            .map(|text| {
                let chunk = json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] });
                format!("data: {}\r\n\r\n", chunk)
            })
            .collect::<String>();
        MockResponse::text(200, "text/event-stream", body)
    })
    .await;

    let config = LLMConfig::new("google", "gemini-1.5-flash")
        .with_api_key("g-key")
        .with_base_url(&server.base_url);
    let fragments: Vec<String> = GoogleProvider::new(&config)
        .unwrap()
        .generate_stream(&prompt())
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(fragments, vec!["Bon", "jour"]);
    let request = &server.requests()[0];
    assert!(request.path.contains(":streamGenerateContent"));
    assert!(request.path.contains("alt=sse"));
}
