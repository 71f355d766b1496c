//! Error types for artifact-cache

use thiserror::Error;

use crate::reference::ModReference;

/// Errors that can occur while resolving or materializing artifacts
#[derive(Error, Debug)]
pub enum CacheError {
    /// Remote origin could not be reached
    #[error("fetch failed for {url}: {reason}")]
    FetchUnreachable { url: String, reason: String },

    /// Remote origin answered with a non-success status
    #[error("fetch failed for {url}: HTTP {status}")]
    FetchStatus { url: String, status: u16 },

    /// The resolved download URL carries no usable file name
    #[error("cannot derive a file name from {0}")]
    NoFileName(String),

    /// A cache entry directory exists but holds no artifact files
    #[error("cache entry for {0} is empty")]
    EmptyEntry(ModReference),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while reading or writing entry metadata
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CacheError {
    /// Whether this error came from talking to the remote origin.
    pub fn is_fetch(&self) -> bool {
        matches!(
            self,
            CacheError::FetchUnreachable { .. }
                | CacheError::FetchStatus { .. }
                | CacheError::NoFileName(_)
        )
    }

    pub(crate) fn unreachable(url: &str, err: reqwest::Error) -> Self {
        CacheError::FetchUnreachable {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
