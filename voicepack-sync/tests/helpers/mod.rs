//! Test helpers for voicepack-sync integration tests
//!
//! - ChunkServer: local HTTP server serving component chunks with scripted
//!   failures, delays and stalls
//! - FailingStore: component store whose writes always fail
//! - UnreadableStore: component store whose index lookup always fails
//! - RawServer: TCP server answering every connection with fixed bytes

#![allow(dead_code)]

pub mod chunk_server;
pub mod failing_store;
pub mod raw_server;

pub use chunk_server::{ChunkServer, Reply};
pub use failing_store::{FailingStore, UnreadableStore};
pub use raw_server::RawServer;

use std::sync::Arc;
use std::time::Duration;
use voicepack_common::EventBus;
use voicepack_sync::layout::PackageLayout;
use voicepack_sync::store::ComponentStore;
use voicepack_sync::sync::{PackageSync, SyncSettings};

pub const TARGET_VERSION: &str = "1.0.0";

/// PackageSync over `store` fetching from `server`, with the built-in layout
pub fn package_sync<S: ComponentStore>(store: Arc<S>, server: &ChunkServer, event_bus: EventBus) -> PackageSync<S> {
    package_sync_at(store, server.prefix(), Duration::from_secs(5), event_bus)
}

/// PackageSync over `store` fetching from `prefix` with `request_timeout`
pub fn package_sync_at<S: ComponentStore>(
    store: Arc<S>,
    prefix: String,
    request_timeout: Duration,
    event_bus: EventBus,
) -> PackageSync<S> {
    PackageSync::new(
        store,
        PackageLayout::builtin(),
        SyncSettings {
            target_version: TARGET_VERSION.to_string(),
            package_url_prefix: prefix,
            request_timeout,
        },
        event_bus,
    )
    .unwrap()
}
