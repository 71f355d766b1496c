//! Server log line classification.

use regex::Regex;

use crate::config::{DEFAULT_FAILURE_PATTERN, DEFAULT_SUCCESS_PATTERN};
use crate::domain::{PackError, Result, ValidationEvent};

/// Capture group of the failure pattern holding the artifact file name.
const ARTIFACT_GROUP: usize = 4;

/// Maps a single log line to a [`ValidationEvent`].
///
/// The failure pattern is tested first; the success pattern only if it
/// did not match.
#[derive(Debug, Clone)]
pub struct LineClassifier {
    failure: Regex,
    success: Regex,
}

impl LineClassifier {
    /// Build from custom patterns. The failure pattern must have at least
    /// four capture groups; the fourth names the artifact file.
    pub fn new(failure_pattern: &str, success_pattern: &str) -> Result<Self> {
        let failure = Regex::new(failure_pattern)
            .map_err(|e| PackError::Config(format!("failure pattern: {e}")))?;
        if failure.captures_len() <= ARTIFACT_GROUP {
            return Err(PackError::Config(format!(
                "failure pattern needs capture group {ARTIFACT_GROUP} for the artifact file"
            )));
        }
        let success = Regex::new(success_pattern)
            .map_err(|e| PackError::Config(format!("success pattern: {e}")))?;
        Ok(Self { failure, success })
    }

    pub fn classify(&self, line: &str) -> Option<ValidationEvent> {
        if let Some(caps) = self.failure.captures(line) {
            let artifact = caps
                .get(ARTIFACT_GROUP)
                .map(|m| m.as_str().trim_end())
                .unwrap_or_default();
            if !artifact.is_empty() {
                return Some(ValidationEvent::ArtifactFailure(artifact.to_string()));
            }
        }
        if self.success.is_match(line) {
            return Some(ValidationEvent::CleanCompletion);
        }
        None
    }
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self {
            failure: Regex::new(DEFAULT_FAILURE_PATTERN).expect("default failure pattern is valid"),
            success: Regex::new(DEFAULT_SUCCESS_PATTERN).expect("default success pattern is valid"),
        }
    }
}
