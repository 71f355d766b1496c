//! Domain models for Packforge.
//!
//! - `ModManifest`: the declarative pack description
//! - `ValidationEvent` / `ValidationOutcome`: boot validation results
//! - `PackError`: the error taxonomy

pub mod error;
pub mod manifest;
pub mod outcome;

pub use error::{AssemblyError, PackError, Result};
pub use manifest::{MinecraftTarget, ModLoader, ModManifest, MANIFEST_FILE};
pub use outcome::{RunVerdict, ValidationEvent, ValidationOutcome};
