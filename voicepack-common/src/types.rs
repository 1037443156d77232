//! Package vocabulary shared by the sync and speak services

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Synthesis mode
///
/// Determines how audio is produced and which package (if any) must be
/// installed locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Remote synthesis service call
    #[serde(rename = "online")]
    Remote,
    /// Local inference against a downloaded model package
    #[serde(rename = "offline")]
    LocalInference,
    /// Splicing of pre-recorded fragments from a downloaded audio package
    #[serde(rename = "lightweight")]
    LocalSplice,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Remote => "online",
            Mode::LocalInference => "offline",
            Mode::LocalSplice => "lightweight",
        }
    }

    /// Package type backing this mode (None for remote synthesis)
    pub fn package_kind(&self) -> Option<PackageKind> {
        match self {
            Mode::Remote => None,
            Mode::LocalInference => Some(PackageKind::Model),
            Mode::LocalSplice => Some(PackageKind::Audio),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "online" | "remote" => Ok(Mode::Remote),
            "offline" | "inference" => Ok(Mode::LocalInference),
            "lightweight" | "splice" => Ok(Mode::LocalSplice),
            other => Err(Error::InvalidInput(format!("Unknown mode: {}", other))),
        }
    }
}

/// Package type; each has its own logical component store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    Model,
    Audio,
}

impl PackageKind {
    /// SQLite table holding this package type's components
    pub fn table(&self) -> &'static str {
        match self {
            PackageKind::Model => "model_components",
            PackageKind::Audio => "audio_components",
        }
    }

    /// File extension used in component fetch URLs
    pub fn extension(&self) -> &'static str {
        match self {
            PackageKind::Model => "onnx",
            PackageKind::Audio => "mp3",
        }
    }
}

/// Derived status of one (language, voice, mode) package
///
/// Never stored; recomputed from component records on every reconciliation
/// and reported as the terminal state of every download run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    GatheringInfo,
    GatherFailed,
    AvailableForDownload,
    Incomplete,
    NewVersionAvailable,
    Downloading,
    DownloadFailed,
    DownloadIncomplete,
    CancelledNotDownloaded,
    CancelledIncomplete,
    SaveFailed,
    SaveIncomplete,
    Latest,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::GatheringInfo => "gathering_info",
            PackageStatus::GatherFailed => "gather_failed",
            PackageStatus::AvailableForDownload => "available_for_download",
            PackageStatus::Incomplete => "incomplete",
            PackageStatus::NewVersionAvailable => "new_version_available",
            PackageStatus::Downloading => "downloading",
            PackageStatus::DownloadFailed => "download_failed",
            PackageStatus::DownloadIncomplete => "download_incomplete",
            PackageStatus::CancelledNotDownloaded => "cancelled_not_downloaded",
            PackageStatus::CancelledIncomplete => "cancelled_incomplete",
            PackageStatus::SaveFailed => "save_failed",
            PackageStatus::SaveIncomplete => "save_incomplete",
            PackageStatus::Latest => "latest",
        }
    }

    /// True while a reconciliation or download is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, PackageStatus::GatheringInfo | PackageStatus::Downloading)
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
