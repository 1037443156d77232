//! Local chunk server
//!
//! Binds to `127.0.0.1:0` and answers `GET /pkg@{version}/{language}/{voice}/{file}`
//! by looking up the scripted [`Reply`] for `{file}`. Unknown files get 404.

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Scripted response for one chunk file
#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 with Content-Length
    Body(Vec<u8>),
    /// 200 with Content-Length after waiting before the head
    Delayed(Duration, Vec<u8>),
    /// Bare status code, empty body
    Status(u16),
    /// 200 with a chunked body and no Content-Length
    NoLength(Vec<u8>),
    /// Declares the full length, sends the first half, then never finishes
    Stall(Vec<u8>),
}

#[derive(Clone)]
struct ServerState {
    replies: Arc<HashMap<String, Reply>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

pub struct ChunkServer {
    base_url: String,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    handle: JoinHandle<()>,
}

impl ChunkServer {
    /// Start serving `replies`, keyed by file name (e.g. `chars_chunk_0.mp3`)
    pub async fn start<I, K>(replies: I) -> Self
    where
        I: IntoIterator<Item = (K, Reply)>,
        K: Into<String>,
    {
        let replies: HashMap<String, Reply> = replies.into_iter().map(|(k, r)| (k.into(), r)).collect();
        let hits = Arc::new(Mutex::new(HashMap::new()));

        let state = ServerState {
            replies: Arc::new(replies),
            hits: Arc::clone(&hits),
        };
        let app = Router::new().route("/*path", get(serve)).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            hits,
            handle,
        }
    }

    /// Package URL prefix to configure the fetcher with
    pub fn prefix(&self) -> String {
        format!("{}/pkg", self.base_url)
    }

    /// Number of requests received for `file`
    pub fn hits(&self, file: &str) -> usize {
        self.hits.lock().unwrap().get(file).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }
}

impl Drop for ChunkServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(State(state): State<ServerState>, Path(path): Path<String>) -> Response {
    let file = path.rsplit('/').next().unwrap_or_default().to_string();
    *state.hits.lock().unwrap().entry(file.clone()).or_default() += 1;

    match state.replies.get(&file).cloned() {
        None => StatusCode::NOT_FOUND.into_response(),
        Some(Reply::Body(bytes)) => bytes.into_response(),
        Some(Reply::Delayed(delay, bytes)) => {
            tokio::time::sleep(delay).await;
            bytes.into_response()
        }
        Some(Reply::Status(code)) => StatusCode::from_u16(code).unwrap().into_response(),
        Some(Reply::NoLength(bytes)) => {
            let body = stream::once(async move { Ok::<_, std::io::Error>(Bytes::from(bytes)) });
            Body::from_stream(body).into_response()
        }
        Some(Reply::Stall(bytes)) => {
            let declared = bytes.len();
            let first_half = Bytes::from(bytes[..declared / 2].to_vec());
            let body = stream::once(async move { Ok::<_, std::io::Error>(first_half) }).chain(stream::once(async {
                futures::future::pending::<()>().await;
                Ok::<_, std::io::Error>(Bytes::new())
            }));
            ([(header::CONTENT_LENGTH, declared.to_string())], Body::from_stream(body)).into_response()
        }
    }
}
