//! Modpack manifest (`manifest.json`).

use std::path::Path;

use artifact_cache::ModReference;
use serde::{Deserialize, Serialize};

use super::error::{PackError, Result};

/// File name of the manifest inside an extracted mod bundle.
pub const MANIFEST_FILE: &str = "manifest.json";

fn default_overrides() -> String {
    "overrides".to_string()
}

/// A mod loader entry under `minecraft.modLoaders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModLoader {
    pub id: String,
    #[serde(default)]
    pub primary: bool,
}

/// Target platform section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinecraftTarget {
    pub version: String,
    #[serde(default, rename = "modLoaders")]
    pub mod_loaders: Vec<ModLoader>,
}

/// Declarative pack description. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModManifest {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub minecraft: MinecraftTarget,
    /// Ordered artifact references.
    #[serde(default)]
    pub files: Vec<ModReference>,
    /// Override directory, relative to the bundle root.
    #[serde(default = "default_overrides")]
    pub overrides: String,
}

impl ModManifest {
    /// Read `<pack_dir>/manifest.json`.
    pub fn load(pack_dir: &Path) -> Result<Self> {
        let path = pack_dir.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&path).map_err(|e| PackError::InvalidManifest {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| PackError::InvalidManifest {
            path,
            reason: e.to_string(),
        })
    }

    pub fn platform_version(&self) -> &str {
        &self.minecraft.version
    }

    /// `<name>-<platform version>-<pack version>`, the release tree name.
    pub fn release_name(&self) -> String {
        format!("{}-{}-{}", self.name, self.minecraft.version, self.version)
    }

    /// Build number of the primary forge loader, e.g. `1614` for
    /// `forge-10.13.4.1614`.
    pub fn forge_version(&self) -> Option<&str> {
        let loader = self
            .minecraft
            .mod_loaders
            .iter()
            .find(|l| l.primary)
            .or_else(|| self.minecraft.mod_loaders.first())?;
        let version = loader.id.strip_prefix("forge-")?;
        version.rsplit('.').next().filter(|b| !b.is_empty())
    }

    /// Override root for a bundle extracted at `pack_dir`.
    pub fn overrides_dir(&self, pack_dir: &Path) -> std::path::PathBuf {
        pack_dir.join(&self.overrides)
    }
}
