//! Bundle assembly: template + overrides + cached artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use artifact_cache::{ArtifactCache, Resolution};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::info;

use crate::domain::{AssemblyError, ModManifest, Result};
use crate::obs;
use crate::tree::{replace_path, WorkingTreePair, MODS_DIR};

/// Composes the base tree and its release mirror.
pub struct BundleAssembler<'a> {
    cache: &'a ArtifactCache,
    concurrency: usize,
}

impl<'a> BundleAssembler<'a> {
    pub fn new(cache: &'a ArtifactCache, concurrency: usize) -> Self {
        Self {
            cache,
            concurrency: concurrency.max(1),
        }
    }

    /// Assemble `base_tree` in place and mirror it to
    /// `<base_tree>/../<release name>`.
    ///
    /// Every top-level entry of each override root replaces the
    /// same-named entry of the base tree wholesale. Artifacts are
    /// resolved through the cache and copied into `mods/` in manifest
    /// order.
    pub async fn assemble(
        &self,
        base_tree: &Path,
        override_roots: &[PathBuf],
        manifest: &ModManifest,
    ) -> Result<WorkingTreePair> {
        if !base_tree.is_dir() {
            return Err(AssemblyError::MissingTemplate(base_tree.to_path_buf()).into());
        }
        let release_tree = base_tree
            .parent()
            .map(|p| p.join(manifest.release_name()))
            .ok_or_else(|| AssemblyError::NoReleaseLocation(base_tree.to_path_buf()))?;

        let mods_dir = base_tree.join(MODS_DIR);
        fs::create_dir_all(&mods_dir)?;

        for root in override_roots {
            apply_overrides(root, base_tree)?;
        }

        let resolutions = self.resolve_all(manifest).await?;
        let mut cache_hits = 0;
        for resolution in &resolutions {
            if resolution.cache_hit {
                cache_hits += 1;
            }
            for file in &resolution.files {
                if let Some(name) = file.file_name() {
                    fs::copy(file, mods_dir.join(name))?;
                }
            }
        }
        obs::emit_assembled(base_tree, resolutions.len(), cache_hits);

        WorkingTreePair::mirror(base_tree, &release_tree)
    }

    async fn resolve_all(&self, manifest: &ModManifest) -> Result<Vec<Resolution>> {
        let resolutions = stream::iter(manifest.files.iter().copied())
            .map(|reference| async move {
                self.cache
                    .resolve(&reference)
                    .await
                    .map_err(|source| AssemblyError::Unresolvable { reference, source })
            })
            .buffered(self.concurrency)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(resolutions)
    }
}

/// Replace each top-level entry of `base_tree` found in `root`.
pub fn apply_overrides(root: &Path, base_tree: &Path) -> Result<()> {
    if !root.is_dir() {
        return Err(AssemblyError::MissingOverride(root.to_path_buf()).into());
    }

    let mut entries: Vec<_> = fs::read_dir(root)?
        .map(|e| e.map(|e| e.file_name()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();

    for name in entries {
        info!(entry = %name.to_string_lossy(), "applying override");
        replace_path(&root.join(&name), &base_tree.join(&name))?;
    }
    Ok(())
}
