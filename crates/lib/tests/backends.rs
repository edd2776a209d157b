//! Integration test: run the LLM clients and a full agent turn against mock Ollama and
//! OpenAI-compatible servers bound to a free local port. Server tasks are left running when
//! each test ends.

use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use concierge::agent::{LlmGenerator, SupportAgent};
use concierge::config::AgentConfig;
use concierge::knowledge::{BackendEmbedder, Chunker, Document, KnowledgeBase};
use concierge::llm::{ChatMessage, ChatOptions, LlmBackend, LlmError, OllamaClient, OpenAiClient};
use serde_json::{json, Value};
use std::sync::Arc;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

fn last_content(body: &Value) -> String {
    body["messages"]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default()
        .to_string()
}

/// Replies like a small support model: label for the classifier, grade for the review, answer otherwise.
fn scripted_reply(body: &Value) -> String {
    let first = body["messages"][0]["content"].as_str().unwrap_or_default();
    let last = last_content(body);
    if first.contains("intent classifier") {
        "question".to_string()
    } else if last.contains("Review this support interaction") {
        "COMPLETE: yes\nCLARIFICATION_NEEDED: no\nCONFIDENCE: 0.9".to_string()
    } else if last.contains("30 days") {
        "You can return unused items within 30 days of purchase.".to_string()
    } else {
        "I'm not sure.".to_string()
    }
}

fn toy_embedding(text: &str) -> Vec<f32> {
    let t = text.to_lowercase();
    if t.contains("return") {
        vec![1.0, 0.0]
    } else {
        vec![0.0, 1.0]
    }
}

async fn ollama_chat(Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(body["stream"], false);
    Json(json!({
        "model": body["model"],
        "message": { "role": "assistant", "content": scripted_reply(&body) },
        "done": true
    }))
}

async fn ollama_embed(Json(body): Json<Value>) -> Json<Value> {
    let embeddings: Vec<Vec<f32>> = body["input"]
        .as_array()
        .map(|a| a.iter().map(|v| toy_embedding(v.as_str().unwrap_or_default())).collect())
        .unwrap_or_default();
    Json(json!({ "model": body["model"], "embeddings": embeddings }))
}

async fn ollama_tags() -> Json<Value> {
    Json(json!({ "models": [{ "name": "llama3.2:latest" }, { "name": "nomic-embed-text:latest" }] }))
}

fn ollama_app() -> Router {
    Router::new()
        .route("/api/chat", post(ollama_chat))
        .route("/api/embed", post(ollama_embed))
        .route("/api/tags", get(ollama_tags))
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer sk-test")
}

async fn openai_chat(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": { "message": "invalid api key" } })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": scripted_reply(&body) } }]
        })),
    )
}

async fn openai_embeddings(Json(body): Json<Value>) -> Json<Value> {
    let inputs = body["input"].as_array().cloned().unwrap_or_default();
    // Out of order on purpose; the client must sort by index.
    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .rev()
        .map(|(i, v)| json!({ "index": i, "embedding": toy_embedding(v.as_str().unwrap_or_default()) }))
        .collect();
    Json(json!({ "data": data }))
}

async fn openai_models() -> Json<Value> {
    Json(json!({ "data": [{ "id": "gpt-4o-mini" }] }))
}

fn openai_app() -> Router {
    Router::new()
        .route("/v1/chat/completions", post(openai_chat))
        .route("/v1/embeddings", post(openai_embeddings))
        .route("/v1/models", get(openai_models))
}

#[tokio::test]
async fn ollama_client_chat_embed_and_tags() {
    let base = serve(ollama_app()).await;
    let client = OllamaClient::new(Some(format!("{}/", base)));
    assert_eq!(client.base_url(), base);

    let reply = client
        .chat(
            "llama3.2:latest",
            vec![ChatMessage::user("What's the window? 30 days?")],
            ChatOptions { temperature: Some(0.1) },
        )
        .await
        .expect("chat");
    assert!(reply.contains("30 days"));

    let vectors = client
        .embed("nomic-embed-text", &["return policy".to_string(), "shipping".to_string()])
        .await
        .expect("embed");
    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);

    let models = client.list_models().await.expect("tags");
    assert_eq!(models, vec!["llama3.2:latest", "nomic-embed-text:latest"]);
}

#[tokio::test]
async fn openai_client_orders_embeddings_and_sends_key() {
    let base = serve(openai_app()).await;
    let client = OpenAiClient::new(Some(format!("{}/v1", base)), Some("sk-test".to_string()));

    let vectors = client
        .embed(
            "text-embedding-3-small",
            &["shipping".to_string(), "returns".to_string()],
        )
        .await
        .expect("embed");
    assert_eq!(vectors, vec![vec![0.0, 1.0], vec![1.0, 0.0]]);

    let reply = client
        .chat("gpt-4o-mini", vec![ChatMessage::user("hello")], ChatOptions::default())
        .await
        .expect("chat");
    assert_eq!(reply, "I'm not sure.");

    assert_eq!(client.list_models().await.expect("models"), vec!["gpt-4o-mini"]);
}

#[tokio::test]
async fn openai_client_surfaces_api_errors() {
    let base = serve(openai_app()).await;
    let client = OpenAiClient::new(Some(format!("{}/v1", base)), Some("wrong".to_string()));
    let err = client
        .chat("gpt-4o-mini", vec![ChatMessage::user("hello")], ChatOptions::default())
        .await
        .unwrap_err();
    match err {
        LlmError::Api(msg) => assert!(msg.contains("401"), "unexpected message: {}", msg),
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn agent_turn_over_ollama() {
    let base = serve(ollama_app()).await;
    let client = OllamaClient::new(Some(base));

    let kb = KnowledgeBase::new(
        Arc::new(BackendEmbedder::new(client.clone(), "nomic-embed-text")),
        Chunker::default(),
    );
    kb.add_documents(&[
        Document::new("return_policy.md", "Items can be returned within 30 days of purchase."),
        Document::new("shipping.md", "Standard shipping takes 3-5 business days."),
    ])
    .await
    .expect("index documents");

    let generator = LlmGenerator::new(client, "llama3.2:latest").with_temperature(0.1);
    let agent = SupportAgent::new(Arc::new(kb), Arc::new(generator), AgentConfig::default());

    let r = agent.process_message("What's your return policy?", "web-1").await;

    assert!(!r.is_degraded(), "degraded: {:?}", r.error);
    assert_eq!(r.text, "You can return unused items within 30 days of purchase.");
    assert_eq!(r.confidence, 0.9);
    assert_eq!(r.sources, vec!["return_policy.md"]);
    assert!(!r.needs_clarification);
    assert_eq!(agent.sessions().history("web-1").await.len(), 2);
}

#[tokio::test]
async fn unreachable_backend_degrades_turn() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    let port = listener.local_addr().expect("local_addr").port();
    drop(listener);
    let client = OllamaClient::new(Some(format!("http://127.0.0.1:{}", port)));

    let kb = KnowledgeBase::new(
        Arc::new(BackendEmbedder::new(client.clone(), "nomic-embed-text")),
        Chunker::default(),
    );
    let generator = LlmGenerator::new(client, "llama3.2:latest");
    let agent = SupportAgent::new(Arc::new(kb), Arc::new(generator), AgentConfig::default());

    let r = agent.process_message("Where is my order?", "s").await;

    assert!(r.is_degraded());
    assert_eq!(r.confidence, 0.0);
    assert!(r.sources.is_empty());
}
