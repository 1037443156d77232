//! Error types for voicepack-speak
//!
//! Synthesis failures are reported separately from download failures so a
//! caller can offer the right remedy: fetch the package, or just retry.

use thiserror::Error;
use voicepack_common::Mode;

/// Main error type for voicepack-speak
#[derive(Error, Debug)]
pub enum Error {
    /// Component store read failure
    #[error("Storage error for {scope}: {source}")]
    Storage {
        scope: String,
        #[source]
        source: voicepack_common::Error,
    },

    /// Remote synthesis service failure; `code` is the service's error
    /// identifier, `HTTP_<status>` or `NetworkError`
    #[error("Remote synthesis failed ({code}): {message}")]
    RemoteService { code: String, message: String },

    /// The package required by a local mode is not installed
    #[error("No complete {mode} package installed for {language}/{voice}")]
    AssetMissing {
        mode: Mode,
        language: String,
        voice: String,
    },

    /// Audio bytes could not be decoded or resampled
    #[error("Decode error: {0}")]
    Decode(String),

    /// Local inference engine failure
    #[error("Inference error: {0}")]
    Inference(String),

    /// Audio device failure
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Operation not valid in the current playback state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// What a caller can do about a failed synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remedy {
    /// Download or repair the voice package, then retry
    Download,
    /// Retry as is
    Retry,
}

impl Error {
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Error::RemoteService {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn remedy(&self) -> Remedy {
        match self {
            Error::AssetMissing { .. } | Error::Storage { .. } => Remedy::Download,
            _ => Remedy::Retry,
        }
    }
}

/// Convenience Result type using voicepack-speak Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remedy_by_kind() {
        let missing = Error::AssetMissing {
            mode: Mode::LocalSplice,
            language: "yue".to_string(),
            voice: "female".to_string(),
        };
        assert_eq!(missing.remedy(), Remedy::Download);
        assert_eq!(Error::remote("RateLimited", "slow down").remedy(), Remedy::Retry);

        let unreadable = Error::Storage {
            scope: "yue/female/chars".to_string(),
            source: voicepack_common::Error::Internal("database is locked".to_string()),
        };
        assert_eq!(unreadable.remedy(), Remedy::Download);
    }

    #[test]
    fn test_asset_missing_message_names_mode() {
        let missing = Error::AssetMissing {
            mode: Mode::LocalInference,
            language: "cmn".to_string(),
            voice: "male".to_string(),
        };
        assert_eq!(missing.to_string(), "No complete offline package installed for cmn/male");
    }
}
