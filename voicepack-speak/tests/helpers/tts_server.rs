//! Local remote-synthesis service
//!
//! Answers `GET /tts/{language}/{text}?voice=..&speed=..`. The text picks
//! the reply: `limited` is a structured 429, `broken` a plain-text 502,
//! anything else the configured WAV body.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// One received request
#[derive(Debug, Clone, PartialEq)]
pub struct Received {
    pub language: String,
    pub text: String,
    pub voice: Option<String>,
    pub speed: Option<String>,
}

#[derive(Clone)]
struct ServerState {
    audio: Arc<Vec<u8>>,
    received: Arc<Mutex<Vec<Received>>>,
}

pub struct TtsServer {
    base_url: String,
    received: Arc<Mutex<Vec<Received>>>,
    handle: JoinHandle<()>,
}

impl TtsServer {
    pub async fn start(audio: Vec<u8>) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let state = ServerState {
            audio: Arc::new(audio),
            received: Arc::clone(&received),
        };
        let app = Router::new()
            .route("/tts/:language/:text", get(speak))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/tts", addr),
            received,
            handle,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn hits(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

impl Drop for TtsServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn speak(
    State(state): State<ServerState>,
    Path((language, text)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.received.lock().unwrap().push(Received {
        language,
        text: text.clone(),
        voice: params.get("voice").cloned(),
        speed: params.get("speed").cloned(),
    });

    match text.as_str() {
        "limited" => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": "RateLimited", "message": "Too many requests"})),
        )
            .into_response(),
        "broken" => (StatusCode::BAD_GATEWAY, "upstream exploded").into_response(),
        _ => ([(header::CONTENT_TYPE, "audio/wav")], state.audio.as_ref().clone()).into_response(),
    }
}
