//! Error types for voicepack-sync
//!
//! Download failures are scoped to one request or one component and are
//! collected per run rather than short-circuiting sibling components.

use thiserror::Error;

/// Main error type for voicepack-sync
#[derive(Error, Debug)]
pub enum Error {
    /// Component store read or write failure
    #[error("Storage error for {scope}: {source}")]
    Storage {
        /// `language/voice` for reads, `language/voice/component` for writes
        scope: String,
        #[source]
        source: voicepack_common::Error,
    },

    /// Transport failure while fetching a component chunk
    #[error("Fetch of {request} failed: {reason}")]
    Fetch { request: String, reason: String },

    /// Non-success HTTP status for a component chunk
    #[error("Fetch of {request} returned HTTP {status}")]
    Status { request: String, status: u16 },

    /// Missing, non-integer or non-positive Content-Length header
    #[error("Fetch of {request} has invalid Content-Length: {value}")]
    InvalidContentLength { request: String, value: String },

    /// Body length differs from the declared Content-Length
    #[error("Fetch of {request} delivered {received} of {expected} declared bytes")]
    TruncatedBody {
        request: String,
        expected: u64,
        received: u64,
    },

    /// Request aborted by the shared cancellation signal
    #[error("Fetch of {request} was cancelled")]
    Cancelled { request: String },

    /// Several independent failures from one run
    #[error("{} errors during download: {}", .0.len(), summarize(.0))]
    Aggregate(Vec<Error>),

    /// Invalid package layout or URL configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A download is already running for the same package
    #[error("Download already running for {0}")]
    AlreadyRunning(String),

    /// Shared configuration/database error
    #[error(transparent)]
    Common(#[from] voicepack_common::Error),
}

impl Error {
    /// Wrap a store failure for the given scope
    pub fn storage(scope: impl Into<String>, source: voicepack_common::Error) -> Self {
        Error::Storage {
            scope: scope.into(),
            source,
        }
    }

    /// True for store read/write failures (including inside aggregates)
    pub fn is_storage(&self) -> bool {
        match self {
            Error::Storage { .. } => true,
            Error::Aggregate(errors) => errors.iter().any(Error::is_storage),
            _ => false,
        }
    }

    /// True for requests aborted by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// Collapse collected errors: none, the single error, or an aggregate
    pub fn collect(mut errors: Vec<Error>) -> Option<Error> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Error::Aggregate(errors)),
        }
    }
}

fn summarize(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience Result type using voicepack-sync Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_error(request: &str) -> Error {
        Error::Fetch {
            request: request.to_string(),
            reason: "connection reset".to_string(),
        }
    }

    #[test]
    fn test_collect_none_single_aggregate() {
        assert!(Error::collect(vec![]).is_none());

        let single = Error::collect(vec![fetch_error("chars_chunk_0")]).unwrap();
        assert!(matches!(single, Error::Fetch { .. }));

        let many = Error::collect(vec![fetch_error("a"), fetch_error("b")]).unwrap();
        match many {
            Error::Aggregate(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected aggregate, got {:?}", other),
        }
    }

    #[test]
    fn test_storage_detection_sees_through_aggregates() {
        let storage = Error::storage(
            "yue/female/chars",
            voicepack_common::Error::Internal("disk full".to_string()),
        );
        assert!(storage.is_storage());

        let aggregate = Error::Aggregate(vec![fetch_error("words"), storage]);
        assert!(aggregate.is_storage());
        assert!(!fetch_error("words").is_storage());
    }

    #[test]
    fn test_aggregate_message_lists_members() {
        let aggregate = Error::Aggregate(vec![fetch_error("a"), fetch_error("b")]);
        let message = aggregate.to_string();
        assert!(message.starts_with("2 errors during download"));
        assert!(message.contains("Fetch of a failed"));
        assert!(message.contains("Fetch of b failed"));
    }
}
