//! HTTP control API
//!
//! Exposes package reconciliation and download control over REST, plus an
//! SSE stream of every [`voicepack_common::VoicePackEvent`].

pub mod error;
pub mod handlers;
pub mod server;
pub mod sse;

pub use error::{ApiError, ApiResult};
pub use server::{create_router, run, AppState};
