//! Workspace layout and input download.

use std::fs;
use std::path::{Path, PathBuf};

use artifact_cache::download_to_dir;
use tracing::info;

use crate::archive::extract_zip;
use crate::domain::Result;

/// Directories derived from the destination root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub root: PathBuf,
    /// Extracted mod bundle (manifest + overrides).
    pub modpack_dir: PathBuf,
    /// Extracted server template; parent of the base and release trees.
    pub server_dir: PathBuf,
    /// Artifact cache root.
    pub cache_dir: PathBuf,
}

impl Workspace {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        let root = dest.into();
        Self {
            modpack_dir: root.join("modpack"),
            server_dir: root.join("server"),
            cache_dir: root.join("cache"),
            root,
        }
    }

    pub fn base_tree(&self, template_dir: &str) -> PathBuf {
        self.server_dir.join(template_dir)
    }

    pub fn release_tree(&self, release_name: &str) -> PathBuf {
        self.server_dir.join(release_name)
    }

    /// Create the root and cache directories.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::create_dir_all(&self.cache_dir)?;
        Ok(())
    }
}

/// Download and extract the mod bundle and the server template.
pub async fn bootstrap(
    workspace: &Workspace,
    client: &reqwest::Client,
    bundle_url: &str,
    template_url: &str,
) -> Result<()> {
    workspace.prepare()?;

    info!(url = bundle_url, "fetching mod bundle");
    let bundle = download_to_dir(client, bundle_url, &workspace.root).await?;
    unpack(&bundle, &workspace.modpack_dir)?;

    info!(url = template_url, "fetching server template");
    let template = download_to_dir(client, template_url, &workspace.root).await?;
    unpack(&template, &workspace.server_dir)?;
    Ok(())
}

fn unpack(archive: &Path, dest: &Path) -> Result<()> {
    info!(archive = %archive.display(), dest = %dest.display(), "extracting");
    extract_zip(archive, dest)
}
