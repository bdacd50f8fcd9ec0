//! Run results

use logrotor_core::Error;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::policy::SkipReason;

/// What happened to one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Rotated,
    /// Live file recreated after an interrupted rotation
    Recovered,
    Skipped,
    Failed,
    /// Not attempted because a group-level hook failed
    Aborted,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Rotated => "rotated",
            Outcome::Recovered => "recovered",
            Outcome::Skipped => "skipped",
            Outcome::Failed => "failed",
            Outcome::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub group: String,
    pub path: PathBuf,
    pub outcome: Outcome,
    pub detail: String,
}

/// Everything a run did, collected rather than thrown
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<FileOutcome>,
    pub errors: Vec<Error>,
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no file or mandatory hook failed
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.iter().filter(|o| o.outcome == outcome).count()
    }

    /// Outcome recorded for a path, the last one if there are several
    pub fn outcome_for(&self, path: &Path) -> Option<&FileOutcome> {
        self.outcomes.iter().rev().find(|o| o.path == path)
    }

    pub(crate) fn push(&mut self, group: &str, path: &Path, outcome: Outcome, detail: String) {
        self.outcomes.push(FileOutcome {
            group: group.to_string(),
            path: path.to_path_buf(),
            outcome,
            detail,
        });
    }

    pub(crate) fn skipped(&mut self, group: &str, path: &Path, reason: SkipReason) {
        self.push(group, path, Outcome::Skipped, reason.as_str().to_string());
    }

    pub(crate) fn failed(&mut self, group: &str, path: &Path, error: Error) {
        self.push(group, path, Outcome::Failed, error.to_string());
        self.errors.push(error);
    }

    pub(crate) fn error(&mut self, error: Error) {
        self.errors.push(error);
    }

    pub(crate) fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }
}
