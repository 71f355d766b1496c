//! Structured lifecycle events.
//!
//! Every event carries an `event` field so log pipelines can filter on
//! it. Supervisor runs are wrapped in a span tagged with the run id.

use std::path::Path;

use tracing::{info, warn};

use crate::domain::ValidationOutcome;

/// Span covering one supervised server run.
pub fn run_span(run_id: &str, attempt: u32) -> tracing::Span {
    tracing::info_span!("packforge.run", run_id = %run_id, attempt = attempt)
}

pub fn emit_assembled(tree: &Path, artifacts: usize, cache_hits: usize) {
    info!(
        event = "bundle.assembled",
        tree = %tree.display(),
        artifacts = artifacts,
        cache_hits = cache_hits,
    );
}

pub fn emit_run_started(tree: &Path) {
    info!(event = "validation.run_started", tree = %tree.display());
}

pub fn emit_artifact_removed(artifact: &str) {
    info!(event = "artifact.removed", artifact = %artifact);
}

pub fn emit_artifact_missing(artifact: &str) {
    warn!(event = "artifact.missing", artifact = %artifact, "failed artifact not present in either tree");
}

pub fn emit_clean_completion(lines_scanned: u64) {
    info!(event = "validation.clean_completion", lines_scanned = lines_scanned);
}

pub fn emit_run_finished(outcome: &ValidationOutcome) {
    info!(
        event = "validation.run_finished",
        passed = outcome.passed,
        verdict = ?outcome.verdict,
        removed = outcome.removed_artifacts.len(),
        unremovable = outcome.unremovable_artifacts.len(),
        exit_code = ?outcome.exit_code,
        duration_ms = outcome.duration_ms,
    );
}

pub fn emit_validation_passed(attempts: u32, removed_total: usize) {
    info!(
        event = "validation.passed",
        attempts = attempts,
        removed_total = removed_total,
    );
}

pub fn emit_release_archived(archive: &Path, sha256: &str) {
    info!(event = "release.archived", archive = %archive.display(), sha256 = %sha256);
}
