//! Request handlers

use super::error::{ApiError, ApiResult};
use super::server::AppState;
use crate::reconciler::Reconciliation;
use crate::store::ComponentStore;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;
use voicepack_common::Mode;

#[derive(Debug, Serialize)]
pub struct PackageStatusResponse {
    #[serde(flatten)]
    pub reconciliation: Reconciliation,
    pub downloading: bool,
}

#[derive(Debug, Serialize)]
pub struct DownloadStartedResponse {
    pub run_id: Uuid,
}

fn parse_mode(mode: &str) -> ApiResult<Mode> {
    mode.parse::<Mode>().map_err(ApiError::from)
}

/// GET /health
pub async fn health<S: ComponentStore>(State(state): State<AppState<S>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "module": "voicepack-sync",
        "version": env!("CARGO_PKG_VERSION"),
        "target_version": state.sync.target_version(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// GET /packages/:language/:voice/:mode
///
/// Runs a reconciliation (publishing its status) and reports the result.
pub async fn package_status<S: ComponentStore>(
    State(state): State<AppState<S>>,
    Path((language, voice, mode)): Path<(String, String, String)>,
) -> ApiResult<Json<PackageStatusResponse>> {
    let mode = parse_mode(&mode)?;
    let reconciliation = state.sync.reconcile(&language, &voice, mode).await?;

    Ok(Json(PackageStatusResponse {
        downloading: state.sync.is_running(&language, &voice, mode),
        reconciliation,
    }))
}

/// POST /packages/:language/:voice/:mode/download
///
/// Starts a background download; progress is reported on `/events`.
pub async fn start_download<S: ComponentStore>(
    State(state): State<AppState<S>>,
    Path((language, voice, mode)): Path<(String, String, String)>,
) -> ApiResult<(StatusCode, Json<DownloadStartedResponse>)> {
    let mode = parse_mode(&mode)?;
    let run_id = state.sync.spawn_download(&language, &voice, mode)?;

    info!(%run_id, language, voice, mode = %mode, "Download started via API");
    Ok((StatusCode::ACCEPTED, Json(DownloadStartedResponse { run_id })))
}

/// POST /packages/:language/:voice/:mode/cancel
pub async fn cancel_download<S: ComponentStore>(
    State(state): State<AppState<S>>,
    Path((language, voice, mode)): Path<(String, String, String)>,
) -> ApiResult<Json<Value>> {
    let mode = parse_mode(&mode)?;

    if state.sync.cancel(&language, &voice, mode) {
        Ok(Json(json!({ "cancelled": true })))
    } else {
        Err(ApiError::NotFound(format!(
            "No download running for {}/{}/{}",
            language, voice, mode
        )))
    }
}
