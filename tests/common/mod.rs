//! Helpers shared by the integration tests: an offline config and a
//! scripted Ollama server.

#![allow(dead_code)]

use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use finrag::config::Config;

/// Hash embeddings and an in-memory store; no network, no model download.
pub fn offline_config() -> Config {
    let mut config = Config::minimal();
    config.embedding.provider = "hash".to_string();
    config.embedding.dims = Some(128);
    config.generation.provider = "disabled".to_string();
    config
}

/// A fake Ollama `/api/generate` endpoint.
///
/// Records every request body and replies with `reply`.
pub struct MockOllama {
    pub url: String,
    pub requests: Arc<Mutex<Vec<Value>>>,
    handle: tokio::task::JoinHandle<()>,
}

#[derive(Clone)]
struct MockState {
    reply: String,
    requests: Arc<Mutex<Vec<Value>>>,
}

async fn handle_generate(State(state): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    state.requests.lock().unwrap().push(body);
    Json(json!({ "model": "llama3.2", "response": state.reply, "done": true }))
}

impl MockOllama {
    pub async fn start(reply: &str) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/api/generate", post(handle_generate))
            .with_state(MockState {
                reply: reply.to_string(),
                requests: requests.clone(),
            });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            url: format!("http://{}", addr),
            requests,
            handle,
        }
    }

    /// `offline_config()` with generation routed to this server.
    pub fn config(&self) -> Config {
        let mut config = offline_config();
        config.generation.provider = "ollama".to_string();
        config.generation.url = Some(self.url.clone());
        config.generation.timeout_secs = 10;
        config
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Drop for MockOllama {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
