//! Working trees and the base/release tree pair.
//!
//! The base tree is booted and pruned; the release tree is the copy that
//! gets archived. Both must hold the same mods at all times, so removal
//! goes through [`WorkingTreePair::remove_artifact`] and never through two
//! independent deletes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::domain::{PackError, Result};

/// Mods directory inside a working tree.
pub const MODS_DIR: &str = "mods";

const STAGED_SUFFIX: &str = ".packforge-removing";

/// Recursively copy `src` into `dst`. `dst` must not exist.
pub fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Remove a file or directory at `path`; missing paths are fine.
pub fn remove_path(path: &Path) -> std::io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Replace `dst` wholesale with a copy of `src` (delete, then copy).
pub fn replace_path(src: &Path, dst: &Path) -> std::io::Result<()> {
    remove_path(dst)?;
    if src.is_dir() {
        copy_tree(src, dst)
    } else {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, dst).map(|_| ())
    }
}

/// Whether `name` is a single plain file name safe to join onto a dir.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

/// Base tree plus its release mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingTreePair {
    base: PathBuf,
    release: PathBuf,
}

impl WorkingTreePair {
    /// Pair two existing trees.
    pub fn new(base: impl Into<PathBuf>, release: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            release: release.into(),
        }
    }

    /// Copy `base` to `release`, discarding any previous release tree.
    pub fn mirror(base: &Path, release: &Path) -> Result<Self> {
        remove_path(release)?;
        copy_tree(base, release)?;
        debug!(base = %base.display(), release = %release.display(), "release tree mirrored");
        Ok(Self::new(base, release))
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn release(&self) -> &Path {
        &self.release
    }

    pub fn base_mods(&self) -> PathBuf {
        self.base.join(MODS_DIR)
    }

    pub fn release_mods(&self) -> PathBuf {
        self.release.join(MODS_DIR)
    }

    /// Remove `artifact` from both mods directories.
    ///
    /// Both copies are first renamed aside; if the second rename fails the
    /// first is restored, so the trees never end up disagreeing. Returns
    /// `false` when the artifact was in neither tree.
    pub fn remove_artifact(&self, artifact: &str) -> Result<bool> {
        if !is_plain_file_name(artifact) {
            return Err(PackError::UnsafeArtifactName(artifact.to_string()));
        }

        let base_path = self.base_mods().join(artifact);
        let release_path = self.release_mods().join(artifact);
        let base_staged = staged_path(&self.base_mods(), artifact);
        let release_staged = staged_path(&self.release_mods(), artifact);

        let in_base = stage(&base_path, &base_staged)?;
        let in_release = match stage(&release_path, &release_staged) {
            Ok(present) => present,
            Err(e) => {
                if in_base {
                    fs::rename(&base_staged, &base_path)?;
                }
                return Err(e.into());
            }
        };

        if in_base != in_release {
            warn!(
                artifact = %artifact,
                in_base = in_base,
                in_release = in_release,
                "artifact was present in only one tree"
            );
        }

        if in_base {
            remove_path(&base_staged)?;
        }
        if in_release {
            remove_path(&release_staged)?;
        }
        Ok(in_base || in_release)
    }

    /// Fail unless both mods directories hold byte-identical files.
    pub fn verify_in_sync(&self) -> Result<()> {
        let base = mods_digests(&self.base_mods())?;
        let release = mods_digests(&self.release_mods())?;
        if base == release {
            return Ok(());
        }

        let only_base: Vec<_> = base.keys().filter(|k| !release.contains_key(*k)).collect();
        let only_release: Vec<_> = release.keys().filter(|k| !base.contains_key(*k)).collect();
        let changed: Vec<_> = base
            .iter()
            .filter(|(k, v)| release.get(*k).is_some_and(|r| r != *v))
            .map(|(k, _)| k)
            .collect();
        Err(PackError::TreeDivergence(format!(
            "only in base: {only_base:?}, only in release: {only_release:?}, differing: {changed:?}"
        )))
    }

    /// Mod file names currently in the base tree, sorted.
    pub fn mod_names(&self) -> Result<Vec<String>> {
        Ok(mods_digests(&self.base_mods())?.into_keys().collect())
    }
}

fn staged_path(mods_dir: &Path, artifact: &str) -> PathBuf {
    mods_dir.join(format!(".{artifact}{STAGED_SUFFIX}"))
}

fn stage(path: &Path, staged: &Path) -> std::io::Result<bool> {
    match fs::rename(path, staged) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn mods_digests(mods_dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut digests = BTreeMap::new();
    if !mods_dir.is_dir() {
        return Ok(digests);
    }
    for entry in fs::read_dir(mods_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let bytes = fs::read(entry.path())?;
        digests.insert(
            entry.file_name().to_string_lossy().into_owned(),
            hex::encode(Sha256::digest(&bytes)),
        );
    }
    Ok(digests)
}
