//! Artifact cache for modpack assembly
//!
//! Maps a `(project, file)` pair to a set of local files. The remote
//! origin is contacted only the first time a pair is seen; afterwards
//! the on-disk entry is served as-is.
//!
//! ## Layout
//!
//! `<root>/<project_id>/<file_id>/<artifact>` plus a `.entry.json`
//! provenance record per entry.

pub mod download;
pub mod error;
pub mod origin;
pub mod reference;
pub mod store;

pub use download::{download_to_dir, file_name_from_url};
pub use error::{CacheError, Result};
pub use origin::{ArtifactOrigin, FetchedArtifact, HttpOrigin, OriginConfig, DEFAULT_ORIGIN_URL};
pub use reference::ModReference;
pub use store::{
    list_entry_files, ArtifactCache, EntryFile, EntryMetadata, Resolution, ENTRY_METADATA_FILE,
};
