//! # voicepack Package Sync Library (voicepack-sync)
//!
//! Keeps the locally installed voice packages in step with the target
//! version.
//!
//! **Architecture:** the [`reconciler::VersionReconciler`] compares the
//! component store against the [`layout::PackageLayout`] and produces the
//! missing/stale list; the [`fetch::ChunkedFetcher`] downloads those
//! components as concurrent byte-range chunks and commits each one through
//! the [`writer::StoreWriter`]; [`sync::PackageSync`] ties the two together
//! and [`api`] exposes it over HTTP.

pub mod api;
pub mod error;
pub mod fetch;
pub mod layout;
pub mod reconciler;
pub mod store;
pub mod sync;
pub mod writer;

pub use error::{Error, Result};
pub use sync::PackageSync;
