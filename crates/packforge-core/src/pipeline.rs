//! End-to-end build: bootstrap, assemble, validate, finalize.

use std::path::PathBuf;
use std::sync::Arc;

use artifact_cache::{ArtifactCache, ArtifactOrigin, HttpOrigin, OriginConfig};
use tracing::info;

use crate::assembler::BundleAssembler;
use crate::bootstrap::{bootstrap, Workspace};
use crate::config::PackConfig;
use crate::domain::{ModManifest, Result};
use crate::release::{ReleaseArtifact, ReleaseFinalizer};
use crate::tree::WorkingTreePair;
use crate::validation::{write_report, ValidationLoop, ValidationReport};

/// Everything produced by a successful build.
#[derive(Debug, Clone)]
pub struct PackRun {
    pub manifest: ModManifest,
    pub pair: WorkingTreePair,
    pub report: ValidationReport,
    pub report_path: PathBuf,
    pub release: ReleaseArtifact,
}

/// Builds a validated server release inside one [`Workspace`].
pub struct PackBuilder {
    config: PackConfig,
    workspace: Workspace,
    origin: Arc<dyn ArtifactOrigin>,
    client: reqwest::Client,
}

impl PackBuilder {
    /// Builder backed by the configured HTTP origin.
    pub fn new(config: PackConfig, dest: impl Into<PathBuf>) -> Result<Self> {
        config.validate()?;
        let origin = HttpOrigin::new(OriginConfig::new(&config.origin_url))?;
        let client = origin.client().clone();
        Ok(Self {
            config,
            workspace: Workspace::new(dest),
            origin: Arc::new(origin),
            client,
        })
    }

    /// Builder with a caller-supplied artifact origin.
    pub fn with_origin(
        config: PackConfig,
        dest: impl Into<PathBuf>,
        origin: Arc<dyn ArtifactOrigin>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            workspace: Workspace::new(dest),
            origin,
            client: reqwest::Client::new(),
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    /// Download and extract the mod bundle and server template.
    pub async fn bootstrap(&self, bundle_url: &str) -> Result<()> {
        bootstrap(
            &self.workspace,
            &self.client,
            bundle_url,
            &self.config.server_template_url,
        )
        .await
    }

    /// Assemble, validate and archive from an already bootstrapped
    /// workspace.
    pub async fn build(&self) -> Result<PackRun> {
        self.workspace.prepare()?;
        let manifest = ModManifest::load(&self.workspace.modpack_dir)?;
        info!(
            pack = %manifest.name,
            version = %manifest.version,
            artifacts = manifest.files.len(),
            "building server release"
        );

        let cache = ArtifactCache::new(&self.workspace.cache_dir, self.origin.clone())?;
        let base_tree = self.workspace.base_tree(&self.config.server_template_dir);
        let overrides = vec![manifest.overrides_dir(&self.workspace.modpack_dir)];
        let pair = BundleAssembler::new(&cache, self.config.fetch_concurrency)
            .assemble(&base_tree, &overrides, &manifest)
            .await?;

        let report = ValidationLoop::new(self.config.launch.clone(), self.config.max_attempts)?
            .run(&pair)
            .await?;
        let report_path = write_report(&report, pair.release())?;

        let release = ReleaseFinalizer::new(self.config.default_forge_version.clone())
            .finalize(pair.release(), &manifest)?;

        Ok(PackRun {
            manifest,
            pair,
            report,
            report_path,
            release,
        })
    }

    /// [`bootstrap`](Self::bootstrap) followed by [`build`](Self::build).
    pub async fn run(&self, bundle_url: &str) -> Result<PackRun> {
        self.bootstrap(bundle_url).await?;
        self.build().await
    }
}
