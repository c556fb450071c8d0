//! Error Types
//!
//! Errors are grouped by the phase that produces them so the front-end can
//! decide what is fatal: preparation errors abort startup, run errors are
//! shown to the operator and never stop the program.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Workflow/catalog inconsistencies detected before anything runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrepareError {
    #[error("unmatched step {0:?}")]
    UnmatchedStep(String),

    #[error("multiple matching steps for {name:?} ({count} matches)")]
    AmbiguousStep { name: String, count: usize },
}

/// Misuse of the executor or the normal end of a workflow.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("executor used before prepare() succeeded")]
    NotPrepared,

    #[error("end of workflow")]
    EndOfWorkflow,

    #[error("saved step index {index} is outside the workflow ({len} steps)")]
    StateOutOfRange { index: usize, len: usize },
}

impl ExecutorError {
    /// Returns true for the expected termination signal of [`next_step`].
    ///
    /// [`next_step`]: crate::execution::Executor::next_step
    pub fn is_end_of_workflow(&self) -> bool {
        matches!(self, Self::EndOfWorkflow)
    }
}

/// Failure of a single step run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("executor is not ready: {0}")]
    Executor(#[from] ExecutorError),

    #[error("failed to create outputs dir: {0}")]
    CreateCaptureDir(#[source] io::Error),

    #[error("failed to start command: {0}")]
    Spawn(#[source] io::Error),

    #[error("command was not started")]
    NotStarted,

    #[error("failed to wait for command: {0}")]
    Wait(#[source] io::Error),

    #[error("command {status}")]
    Failed { status: ExitStatus },

    #[error("command cancelled")]
    Cancelled,

    #[error("failed to read outputs file: {0}")]
    ReadOutput(#[source] io::Error),

    #[error("invalid output line {line_number}: {line:?}")]
    MalformedOutput { line_number: usize, line: String },
}

/// Errors while reading workflow and step definition files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse step file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid glob pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("no step files match {0:?}")]
    NoMatches(String),

    #[error("workflow {} contains no steps", .0.display())]
    EmptyWorkflow(PathBuf),
}

/// Errors from the persisted run state file.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to access state file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode state file {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_error_messages_name_the_step() {
        let err = PrepareError::UnmatchedStep("intro".to_string());
        assert!(err.to_string().contains("\"intro\""));

        let err = PrepareError::AmbiguousStep {
            name: "collect-name".to_string(),
            count: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("collect-name"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_end_of_workflow_detection() {
        assert!(ExecutorError::EndOfWorkflow.is_end_of_workflow());
        assert!(!ExecutorError::NotPrepared.is_end_of_workflow());
    }

    #[test]
    fn test_malformed_output_message() {
        let err = RunError::MalformedOutput {
            line_number: 2,
            line: "garbage".to_string(),
        };
        assert_eq!(err.to_string(), "invalid output line 2: \"garbage\"");
    }
}
