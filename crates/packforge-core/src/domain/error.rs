//! Error taxonomy for Packforge.
//!
//! Fetch, assembly and packaging failures abort a build. Artifact load
//! failures seen while booting the server are not errors: the supervisor
//! repairs the tree and the validation loop retries.

use std::path::PathBuf;

use artifact_cache::{CacheError, ModReference};

/// Errors produced while assembling the server tree.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("server template not found at {0}")]
    MissingTemplate(PathBuf),

    #[error("override tree not found at {0}")]
    MissingOverride(PathBuf),

    #[error("cannot resolve artifact {reference}: {source}")]
    Unresolvable {
        reference: ModReference,
        #[source]
        source: CacheError,
    },

    #[error("base tree {0} has no parent directory for the release tree")]
    NoReleaseLocation(PathBuf),
}

/// Packforge errors.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("fetch error: {0}")]
    Fetch(#[from] CacheError),

    #[error("invalid manifest {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("artifact name {0:?} is not a plain file name")]
    UnsafeArtifactName(String),

    #[error("release tree out of sync with base tree: {0}")]
    TreeDivergence(String),

    #[error("server launch failed: {0}")]
    Launch(String),

    #[error("validation did not pass after {attempts} attempt(s)")]
    ValidationExhausted { attempts: u32 },

    #[error("packaging failed for {path}: {reason}")]
    Packaging { path: PathBuf, reason: String },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackError {
    pub(crate) fn packaging(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PackError::Packaging {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for Packforge operations.
pub type Result<T> = std::result::Result<T, PackError>;
