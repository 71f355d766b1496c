//! Per-line events and per-run outcomes of boot validation.

use serde::{Deserialize, Serialize};

/// Classification of one server log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "artifact", rename_all = "snake_case")]
pub enum ValidationEvent {
    /// A fatal load error attributed to this artifact file.
    ArtifactFailure(String),
    /// The server finished booting and went idle.
    CleanCompletion,
}

/// How a supervised run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunVerdict {
    /// Booted cleanly, nothing removed.
    Clean,
    /// At least one artifact failed and was removed.
    Pruned,
    /// A failure named an artifact that cannot be removed from `mods/`.
    Unremovable,
    /// Output ended without a clean completion or any failure.
    Incomplete,
    /// The boot deadline passed and the process was killed.
    TimedOut,
}

/// Result of one supervised server run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub verdict: RunVerdict,
    /// Failed artifacts in the order their log lines appeared.
    pub removed_artifacts: Vec<String>,
    /// Failed artifacts whose names are not plain file names; left alone.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unremovable_artifacts: Vec<String>,
    pub exit_code: Option<i32>,
    pub lines_scanned: u64,
    pub duration_ms: u64,
}

/// What the supervisor observed while scanning one run's output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RunTally {
    pub clean: bool,
    pub timed_out: bool,
    pub removed: Vec<String>,
    pub unremovable: Vec<String>,
    pub lines_scanned: u64,
}

impl RunTally {
    /// Whether a failure for `artifact` was already handled this run.
    pub fn seen(&self, artifact: &str) -> bool {
        self.removed.iter().chain(&self.unremovable).any(|a| a == artifact)
    }
}

impl ValidationOutcome {
    pub(crate) fn from_run(tally: RunTally, exit_code: Option<i32>, duration_ms: u64) -> Self {
        let verdict = if !tally.unremovable.is_empty() {
            RunVerdict::Unremovable
        } else if tally.timed_out {
            RunVerdict::TimedOut
        } else if !tally.removed.is_empty() {
            RunVerdict::Pruned
        } else if tally.clean {
            RunVerdict::Clean
        } else {
            RunVerdict::Incomplete
        };

        Self {
            passed: verdict == RunVerdict::Clean,
            verdict,
            removed_artifacts: tally.removed,
            unremovable_artifacts: tally.unremovable,
            exit_code,
            lines_scanned: tally.lines_scanned,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(clean: bool, timed_out: bool, removed: &[&str]) -> RunTally {
        RunTally {
            clean,
            timed_out,
            removed: removed.iter().map(|s| s.to_string()).collect(),
            lines_scanned: 5,
            ..RunTally::default()
        }
    }

    #[test]
    fn clean_without_failures_passes() {
        let o = ValidationOutcome::from_run(tally(true, false, &[]), Some(0), 10);
        assert!(o.passed);
        assert_eq!(o.verdict, RunVerdict::Clean);
    }

    #[test]
    fn failures_fail_even_after_clean_completion() {
        let o = ValidationOutcome::from_run(tally(true, false, &["A.jar"]), Some(0), 10);
        assert!(!o.passed);
        assert_eq!(o.verdict, RunVerdict::Pruned);
    }

    #[test]
    fn unremovable_failure_fails_clean_run() {
        let mut t = tally(true, false, &[]);
        t.unremovable.push("1.7.10/x.jar".into());
        let o = ValidationOutcome::from_run(t, Some(0), 10);
        assert!(!o.passed);
        assert_eq!(o.verdict, RunVerdict::Unremovable);
        assert_eq!(o.unremovable_artifacts, vec!["1.7.10/x.jar"]);
    }

    #[test]
    fn seen_covers_both_lists() {
        let mut t = tally(false, false, &["A.jar"]);
        t.unremovable.push("../B.jar".into());
        assert!(t.seen("A.jar"));
        assert!(t.seen("../B.jar"));
        assert!(!t.seen("C.jar"));
    }

    #[test]
    fn silent_exit_is_incomplete() {
        let o = ValidationOutcome::from_run(tally(false, false, &[]), Some(1), 10);
        assert!(!o.passed);
        assert_eq!(o.verdict, RunVerdict::Incomplete);
    }

    #[test]
    fn timeout_wins_over_pruning() {
        let o = ValidationOutcome::from_run(tally(true, true, &["A.jar"]), None, 10);
        assert!(!o.passed);
        assert_eq!(o.verdict, RunVerdict::TimedOut);
    }

    #[test]
    fn event_serializes_tagged() {
        let json = serde_json::to_string(&ValidationEvent::ArtifactFailure("A.jar".into())).unwrap();
        assert_eq!(json, r#"{"kind":"artifact_failure","artifact":"A.jar"}"#);
    }
}
