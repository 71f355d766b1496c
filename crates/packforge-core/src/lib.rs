//! Packforge Core Library
//!
//! Assembles a modded game server from a template, an override set and a
//! cached list of artifacts, then boots it repeatedly, pruning every
//! artifact the server reports as failing, until it starts cleanly. The
//! validated tree is stamped and archived.

pub mod archive;
pub mod assembler;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod obs;
pub mod pipeline;
pub mod release;
pub mod supervisor;
pub mod telemetry;
pub mod tree;
pub mod validation;

pub use domain::{
    AssemblyError, MinecraftTarget, ModLoader, ModManifest, PackError, Result, RunVerdict,
    ValidationEvent, ValidationOutcome, MANIFEST_FILE,
};

pub use artifact_cache;
pub use artifact_cache::{ArtifactCache, ArtifactOrigin, CacheError, ModReference, Resolution};

pub use assembler::BundleAssembler;
pub use bootstrap::{bootstrap, Workspace};
pub use config::{LaunchConfig, PackConfig};
pub use pipeline::{PackBuilder, PackRun};
pub use release::{ReleaseArtifact, ReleaseFinalizer, VersionDescriptor};
pub use telemetry::init_tracing;
pub use supervisor::{LineClassifier, ServerSupervisor, SupervisorState};
pub use tree::WorkingTreePair;
pub use validation::{AttemptRecord, ValidationLoop, ValidationReport};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
