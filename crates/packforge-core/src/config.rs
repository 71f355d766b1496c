//! Packforge configuration.
//!
//! Defaults come from `PACKFORGE_*` environment variables where set; a
//! TOML file may override any subset of fields, and the CLI overrides
//! both.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{PackError, Result};

/// Server template archive used when none is configured.
pub const DEFAULT_TEMPLATE_URL: &str =
    "https://dl.dropboxusercontent.com/u/9412612/ftb_server_pack.zip";

/// Fatal load error line: `<tag> <description> [<id>] (<file>)`.
pub const DEFAULT_FAILURE_PATTERN: &str = r"^\s+(UE|UCE|UCHE|UCHIE)\s+(.*) \[(.*)\] \((.*)\)$";

/// Logged once the default world has been unloaded after a clean boot.
pub const DEFAULT_SUCCESS_PATTERN: &str = r"Unloading dimension 1";

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// How the server is launched and observed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LaunchConfig {
    /// Command run inside the base tree (first element is the executable).
    pub command: Vec<String>,
    /// Acceptance-of-terms marker written before every launch.
    pub eula_file: String,
    pub eula_contents: String,
    /// Line written to the server's stdin to stop it.
    pub stop_directive: String,
    pub failure_pattern: String,
    pub success_pattern: String,
    /// Wall-clock limit per boot (0 = unbounded).
    pub boot_timeout_secs: u64,
    /// Time allowed to exit after the stop directive before a kill.
    pub stop_grace_secs: u64,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            command: vec!["bash".to_string(), "ServerStart.sh".to_string()],
            eula_file: "eula.txt".to_string(),
            eula_contents: "eula=true".to_string(),
            stop_directive: "/stop".to_string(),
            failure_pattern: DEFAULT_FAILURE_PATTERN.to_string(),
            success_pattern: DEFAULT_SUCCESS_PATTERN.to_string(),
            boot_timeout_secs: env_parse_or("PACKFORGE_BOOT_TIMEOUT_SECS", 900),
            stop_grace_secs: env_parse_or("PACKFORGE_STOP_GRACE_SECS", 120),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PackConfig {
    /// Artifact origin (project site) base URL.
    pub origin_url: String,
    /// Server template archive URL.
    pub server_template_url: String,
    /// Directory inside the extracted template that holds the server.
    pub server_template_dir: String,
    /// Maximum validation runs (0 = unbounded).
    pub max_attempts: u32,
    /// Artifacts resolved concurrently during assembly.
    pub fetch_concurrency: usize,
    /// `forgeVersion` used when the manifest names no forge loader.
    pub default_forge_version: String,
    pub launch: LaunchConfig,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            origin_url: env_or("PACKFORGE_ORIGIN_URL", artifact_cache::DEFAULT_ORIGIN_URL),
            server_template_url: env_or("PACKFORGE_TEMPLATE_URL", DEFAULT_TEMPLATE_URL),
            server_template_dir: "ftb_server_pack".to_string(),
            max_attempts: env_parse_or("PACKFORGE_MAX_ATTEMPTS", 50),
            fetch_concurrency: env_parse_or("PACKFORGE_FETCH_CONCURRENCY", 4),
            default_forge_version: "1614".to_string(),
            launch: LaunchConfig::default(),
        }
    }
}

impl PackConfig {
    /// Parse a TOML document; missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| PackError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    PackError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml_str(&text)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.launch.command.is_empty() {
            return Err(PackError::Config("launch.command is empty".to_string()));
        }
        if self.fetch_concurrency == 0 {
            return Err(PackError::Config(
                "fetch_concurrency must be at least 1".to_string(),
            ));
        }
        if self.server_template_dir.is_empty() {
            return Err(PackError::Config(
                "server_template_dir is empty".to_string(),
            ));
        }
        Ok(())
    }
}
