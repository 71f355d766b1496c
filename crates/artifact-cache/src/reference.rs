//! Artifact identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A specific artifact version: an origin project plus one of its files.
///
/// Equality is by the pair, and the pair is the cache key. The serde
/// field names follow the modpack manifest (`projectID` / `fileID`), so a
/// manifest `files` entry deserializes straight into a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModReference {
    #[serde(rename = "projectID")]
    pub project_id: u64,
    #[serde(rename = "fileID")]
    pub file_id: u64,
}

impl ModReference {
    pub fn new(project_id: u64, file_id: u64) -> Self {
        Self {
            project_id,
            file_id,
        }
    }

    /// Entry directory for this reference under a cache root.
    ///
    /// Layout: `<root>/<project_id>/<file_id>`
    pub fn entry_dir(&self, root: &Path) -> PathBuf {
        root.join(self.project_id.to_string())
            .join(self.file_id.to_string())
    }
}

impl fmt::Display for ModReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project_id, self.file_id)
    }
}
