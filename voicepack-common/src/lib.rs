//! # voicepack Common Library
//!
//! Shared code for the voicepack services including:
//! - Package vocabulary (modes, package kinds, package status)
//! - Event types and the broadcast event bus
//! - Bootstrap configuration loading
//! - SQLite pool initialization for the component stores

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod types;

pub use error::{Error, Result};
pub use events::{EventBus, PlaybackState, VoicePackEvent};
pub use types::{Mode, PackageKind, PackageStatus};
