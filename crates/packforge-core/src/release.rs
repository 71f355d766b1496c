//! Release finalization: version stamp, archive and digest.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::archive::zip_dir;
use crate::domain::{ModManifest, PackError, Result};
use crate::obs;

/// Version descriptor file written into the release tree.
pub const VERSION_FILE: &str = "version.json";

/// Contents of `version.json`, read by server launchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    #[serde(rename = "forgeVersion")]
    pub forge_version: String,
    #[serde(rename = "mcVersion")]
    pub mc_version: String,
    #[serde(rename = "packVersion")]
    pub pack_version: String,
    #[serde(rename = "packID")]
    pub pack_id: String,
    pub xml: String,
}

impl VersionDescriptor {
    pub fn for_manifest(manifest: &ModManifest, default_forge_version: &str) -> Self {
        Self {
            forge_version: manifest
                .forge_version()
                .unwrap_or(default_forge_version)
                .to_string(),
            mc_version: manifest.platform_version().to_string(),
            pack_version: manifest.version.clone(),
            pack_id: manifest.name.clone(),
            xml: "modpacks".to_string(),
        }
    }
}

/// The archived release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseArtifact {
    pub archive_path: PathBuf,
    pub digest_path: PathBuf,
    pub sha256: String,
}

/// `<release>_server.zip`, beside the release tree.
pub fn archive_path(release_tree: &Path) -> Result<PathBuf> {
    let name = release_tree
        .file_name()
        .ok_or_else(|| PackError::packaging(release_tree, "release tree has no name"))?;
    Ok(release_tree.with_file_name(format!("{}_server.zip", name.to_string_lossy())))
}

/// Stamps and archives a validated release tree.
#[derive(Debug, Clone)]
pub struct ReleaseFinalizer {
    default_forge_version: String,
}

impl ReleaseFinalizer {
    pub fn new(default_forge_version: impl Into<String>) -> Self {
        Self {
            default_forge_version: default_forge_version.into(),
        }
    }

    /// Write `version.json`, zip the tree and write `<archive>.sha256`.
    pub fn finalize(&self, release_tree: &Path, manifest: &ModManifest) -> Result<ReleaseArtifact> {
        if !release_tree.is_dir() {
            return Err(PackError::packaging(release_tree, "release tree does not exist"));
        }

        let descriptor = VersionDescriptor::for_manifest(manifest, &self.default_forge_version);
        let version_path = release_tree.join(VERSION_FILE);
        let json = serde_json::to_vec(&descriptor)?;
        fs::write(&version_path, json).map_err(|e| PackError::packaging(&version_path, e))?;

        let archive = archive_path(release_tree)?;
        zip_dir(release_tree, &archive).map_err(|e| PackError::packaging(&archive, e))?;

        let bytes = fs::read(&archive).map_err(|e| PackError::packaging(&archive, e))?;
        let sha256 = hex::encode(Sha256::digest(&bytes));
        let digest_path = archive.with_file_name(format!(
            "{}.sha256",
            archive
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        ));
        fs::write(&digest_path, sha256.as_bytes())
            .map_err(|e| PackError::packaging(&digest_path, e))?;

        obs::emit_release_archived(&archive, &sha256);
        Ok(ReleaseArtifact {
            archive_path: archive,
            digest_path,
            sha256,
        })
    }
}
