//! HTTP server setup and routing

use crate::store::ComponentStore;
use crate::sync::PackageSync;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state passed to all handlers
pub struct AppState<S> {
    pub sync: Arc<PackageSync<S>>,
    pub started_at: Instant,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            sync: Arc::clone(&self.sync),
            started_at: self.started_at,
        }
    }
}

impl<S> AppState<S> {
    pub fn new(sync: Arc<PackageSync<S>>) -> Self {
        Self {
            sync,
            started_at: Instant::now(),
        }
    }
}

/// Build the API router
pub fn create_router<S: ComponentStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health::<S>))
        .route(
            "/packages/:language/:voice/:mode",
            get(super::handlers::package_status::<S>),
        )
        .route(
            "/packages/:language/:voice/:mode/download",
            post(super::handlers::start_download::<S>),
        )
        .route(
            "/packages/:language/:voice/:mode/cancel",
            post(super::handlers::cancel_download::<S>),
        )
        .route("/events", get(super::sse::event_stream::<S>))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve the API until `shutdown` resolves
pub async fn run<S: ComponentStore>(
    addr: SocketAddr,
    state: AppState<S>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    info!("Server shutdown complete");
    Ok(())
}
