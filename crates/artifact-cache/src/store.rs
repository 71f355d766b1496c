//! On-disk artifact cache.
//!
//! Entries are keyed by [`ModReference`] and never rewritten once they
//! exist.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{CacheError, Result};
use crate::origin::{ArtifactOrigin, FetchedArtifact};
use crate::reference::ModReference;

/// Metadata file kept inside every entry directory.
pub const ENTRY_METADATA_FILE: &str = ".entry.json";

const STAGING_DIR: &str = ".staging";

/// One materialized artifact file and its digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFile {
    pub name: String,
    pub sha256: String,
}

/// Provenance of a cache entry, written once when the entry is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub reference: ModReference,
    pub source_url: String,
    pub fetched_at: DateTime<Utc>,
    pub files: Vec<EntryFile>,
}

/// Outcome of resolving one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub reference: ModReference,
    /// Local artifact files, sorted by name.
    pub files: Vec<PathBuf>,
    /// `true` when no network access was needed.
    pub cache_hit: bool,
}

/// Filesystem-backed artifact cache keyed by [`ModReference`].
///
/// Layout: `<root>/<project_id>/<file_id>/<artifact files>`
///
/// Entries are append-only. An existing entry directory is authoritative
/// and is never re-fetched. New entries are staged under
/// `<root>/.staging` and moved into place with a single rename, so an
/// entry directory is either complete or absent. First use of a key is
/// single-flight: concurrent callers wait for the one fetch in progress.
pub struct ArtifactCache {
    root: PathBuf,
    origin: Arc<dyn ArtifactOrigin>,
    key_locks: Mutex<HashMap<ModReference, Arc<tokio::sync::Mutex<()>>>>,
}

impl ArtifactCache {
    /// Create a cache rooted at `root`. Creates `root` if needed.
    pub fn new(root: impl AsRef<Path>, origin: Arc<dyn ArtifactOrigin>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            origin,
            key_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether an entry for `reference` is already on disk.
    pub fn contains(&self, reference: &ModReference) -> bool {
        reference.entry_dir(&self.root).is_dir()
    }

    /// Resolve `reference` to local artifact files, fetching on first use.
    pub async fn resolve(&self, reference: &ModReference) -> Result<Resolution> {
        let gate = self.key_lock(reference);
        let _guard = gate.lock().await;

        let entry_dir = reference.entry_dir(&self.root);
        if entry_dir.is_dir() {
            let files = list_entry_files(&entry_dir)?;
            if files.is_empty() {
                return Err(CacheError::EmptyEntry(*reference));
            }
            for file in &files {
                info!(reference = %reference, file = %file.display(), "already cached");
            }
            return Ok(Resolution {
                reference: *reference,
                files,
                cache_hit: true,
            });
        }

        debug!(reference = %reference, "cache miss, fetching");
        let fetched = self.origin.fetch(reference).await?;
        let files = self.materialize(reference, fetched)?;
        for file in &files {
            info!(reference = %reference, file = %file.display(), "fetched");
        }

        Ok(Resolution {
            reference: *reference,
            files,
            cache_hit: false,
        })
    }

    /// Read the provenance metadata of an existing entry.
    pub fn entry_metadata(&self, reference: &ModReference) -> Result<Option<EntryMetadata>> {
        let path = reference.entry_dir(&self.root).join(ENTRY_METADATA_FILE);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn key_lock(&self, reference: &ModReference) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .key_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(*reference).or_default().clone()
    }

    fn materialize(
        &self,
        reference: &ModReference,
        fetched: FetchedArtifact,
    ) -> Result<Vec<PathBuf>> {
        if !is_entry_file_name(&fetched.file_name) {
            return Err(CacheError::NoFileName(fetched.source_url));
        }

        let staging_root = self.root.join(STAGING_DIR);
        fs::create_dir_all(&staging_root)?;
        let staging = tempfile::TempDir::new_in(&staging_root)?;

        fs::write(staging.path().join(&fetched.file_name), &fetched.bytes)?;
        let metadata = EntryMetadata {
            reference: *reference,
            source_url: fetched.source_url,
            fetched_at: Utc::now(),
            files: vec![EntryFile {
                name: fetched.file_name,
                sha256: hex::encode(Sha256::digest(&fetched.bytes)),
            }],
        };
        fs::write(
            staging.path().join(ENTRY_METADATA_FILE),
            serde_json::to_vec_pretty(&metadata)?,
        )?;

        let entry_dir = reference.entry_dir(&self.root);
        if let Some(project_dir) = entry_dir.parent() {
            fs::create_dir_all(project_dir)?;
        }

        // Single rename publishes the whole entry; on failure the staging
        // dir is removed when `staging` drops.
        fs::rename(staging.path(), &entry_dir)?;
        drop(staging);

        list_entry_files(&entry_dir)
    }
}

/// Names that [`list_entry_files`] would report back.
fn is_entry_file_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains('/') && !name.contains('\\')
}

/// Artifact files of an entry directory, dot-files excluded, sorted by name.
pub fn list_entry_files(entry_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(entry_dir)? {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
