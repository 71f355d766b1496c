//! Validate-and-repair loop.
//!
//! Boots the base tree repeatedly until one run passes. Pruning happens
//! inside each supervised run, so the loop only re-launches and checks
//! the outcome. The number of runs is bounded by `max_attempts`
//! (`0` keeps retrying forever).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::LaunchConfig;
use crate::domain::{PackError, Result, ValidationOutcome};
use crate::obs;
use crate::supervisor::ServerSupervisor;
use crate::tree::WorkingTreePair;

/// File name of the persisted report, written beside the release tree.
pub const REPORT_SUFFIX: &str = "_validation.json";

/// One supervised run within the loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub outcome: ValidationOutcome,
}

/// Full history of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub attempts: Vec<AttemptRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ValidationReport {
    /// Every artifact removed across all runs, in removal order.
    pub fn removed_artifacts(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .flat_map(|a| a.outcome.removed_artifacts.iter().map(String::as_str))
            .collect()
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }
}

/// Drives [`ServerSupervisor`] runs until the tree boots cleanly.
pub struct ValidationLoop {
    supervisor: ServerSupervisor,
    max_attempts: u32,
}

impl ValidationLoop {
    pub fn new(launch: LaunchConfig, max_attempts: u32) -> Result<Self> {
        Ok(Self {
            supervisor: ServerSupervisor::new(launch)?,
            max_attempts,
        })
    }

    /// Run until a clean boot. Fails with `ValidationExhausted` once
    /// `max_attempts` runs have all failed, and with `UnsafeArtifactName`
    /// as soon as a run reports a failure that cannot be pruned.
    pub async fn run(&self, pair: &WorkingTreePair) -> Result<ValidationReport> {
        let started_at = Utc::now();
        let mut attempts = Vec::new();
        let mut attempt = 0u32;

        loop {
            if self.max_attempts != 0 && attempt >= self.max_attempts {
                return Err(PackError::ValidationExhausted { attempts: attempt });
            }
            attempt += 1;
            info!(attempt = attempt, "testing server");

            let outcome = self.supervisor.run(pair, attempt).await?;
            // Re-running cannot clear a failure that pruning refuses to touch.
            if let Some(name) = outcome.unremovable_artifacts.first() {
                return Err(PackError::UnsafeArtifactName(name.clone()));
            }
            let passed = outcome.passed;
            attempts.push(AttemptRecord { attempt, outcome });

            if passed {
                pair.verify_in_sync()?;
                let report = ValidationReport {
                    attempts,
                    started_at,
                    finished_at: Utc::now(),
                };
                obs::emit_validation_passed(attempt, report.removed_artifacts().len());
                return Ok(report);
            }
        }
    }
}

/// Path of the report for a release tree: `<release>_validation.json`.
pub fn report_path(release_tree: &Path) -> PathBuf {
    let name = release_tree
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "release".to_string());
    release_tree.with_file_name(format!("{name}{REPORT_SUFFIX}"))
}

/// Persist `report` beside the release tree (never inside it).
pub fn write_report(report: &ValidationReport, release_tree: &Path) -> Result<PathBuf> {
    let path = report_path(release_tree);
    std::fs::write(&path, serde_json::to_vec_pretty(report)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RunVerdict;

    fn outcome(removed: &[&str], passed: bool) -> ValidationOutcome {
        ValidationOutcome {
            passed,
            verdict: if passed {
                RunVerdict::Clean
            } else {
                RunVerdict::Pruned
            },
            removed_artifacts: removed.iter().map(|s| s.to_string()).collect(),
            unremovable_artifacts: vec![],
            exit_code: Some(0),
            lines_scanned: 1,
            duration_ms: 1,
        }
    }

    #[test]
    fn report_flattens_removals_in_order() {
        let report = ValidationReport {
            attempts: vec![
                AttemptRecord {
                    attempt: 1,
                    outcome: outcome(&["A.jar", "B.jar"], false),
                },
                AttemptRecord {
                    attempt: 2,
                    outcome: outcome(&["D.jar"], false),
                },
                AttemptRecord {
                    attempt: 3,
                    outcome: outcome(&[], true),
                },
            ],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        assert_eq!(report.removed_artifacts(), vec!["A.jar", "B.jar", "D.jar"]);
        assert_eq!(report.attempt_count(), 3);
    }

    #[test]
    fn report_lives_beside_release_tree() {
        assert_eq!(
            report_path(Path::new("/srv/server/Pack-1.7.10-1.0")),
            PathBuf::from("/srv/server/Pack-1.7.10-1.0_validation.json")
        );
    }

    #[test]
    fn write_report_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let release = dir.path().join("Pack-1.7.10-1.0");
        std::fs::create_dir_all(&release).unwrap();
        let report = ValidationReport {
            attempts: vec![AttemptRecord {
                attempt: 1,
                outcome: outcome(&[], true),
            }],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        let path = write_report(&report, &release).unwrap();
        assert!(!path.starts_with(&release));
        let back: ValidationReport =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, report);
    }
}
