use std::{
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
};

use crate::orchestrator::CloneError;

/// A single clone to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneRequest {
    source_url: String,
    destination: PathBuf,
    recursive_submodules: bool,
}

impl CloneRequest {
    pub fn new(source_url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        CloneRequest {
            source_url: source_url.into(),
            destination: destination.into(),
            recursive_submodules: false,
        }
    }

    /// Also initialize and update every submodule, recursively.
    pub fn recursive_submodules(mut self, recursive: bool) -> Self {
        self.recursive_submodules = recursive;
        self
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive_submodules
    }
}

impl Display for CloneRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source_url, self.destination.display())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub phase: String,
    pub detail: String,
    pub current_step: u64,
    pub total_steps: u64,
}

impl ProgressUpdate {
    pub fn new(
        phase: impl Into<String>,
        detail: impl Into<String>,
        current_step: u64,
        total_steps: u64,
    ) -> Self {
        ProgressUpdate {
            phase: phase.into(),
            detail: detail.into(),
            current_step,
            total_steps,
        }
    }
}

impl Display for ProgressUpdate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}/{}",
            self.phase, self.detail, self.current_step, self.total_steps
        )
    }
}

/// Terminal state of a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneOutcome {
    Success,
    Cancelled,
    /// Opaque reason reported by the clone service.
    Failed(String),
}

impl CloneOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CloneOutcome::Success)
    }

    pub fn into_result(self) -> Result<(), CloneError> {
        match self {
            CloneOutcome::Success => Ok(()),
            CloneOutcome::Cancelled => Err(CloneError::Cancelled),
            CloneOutcome::Failed(reason) => Err(CloneError::Failed(reason)),
        }
    }
}

impl Display for CloneOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CloneOutcome::Success => f.write_str("Clone completed"),
            CloneOutcome::Cancelled => f.write_str("Clone cancelled"),
            CloneOutcome::Failed(reason) => write!(f, "Clone failed: {reason}"),
        }
    }
}
