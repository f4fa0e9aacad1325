//! Error types for the task runner

use std::time::Duration;
use thiserror::Error;

/// Result type alias for runner operations
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Everything that can go wrong while executing a task.
///
/// Input errors (`MissingCredential`, `EmptyTask`, `UnsupportedModel`) are
/// returned to the caller before any browser is launched. The others are
/// folded into a failed [`RunOutcome`](crate::RunOutcome) at the runner
/// boundary.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("an API key is required to run the agent")]
    MissingCredential,

    #[error("task description must not be empty")]
    EmptyTask,

    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    /// The session (LLM, browser or agent step) raised an error.
    #[error("{0:#}")]
    SessionRun(anyhow::Error),

    /// The session finished but its history could not be read.
    #[error("could not extract results: {0}")]
    Extraction(String),

    /// Closing the browser failed. Never fatal.
    #[error("failed to close browser: {0:#}")]
    Cleanup(anyhow::Error),

    #[error("run was cancelled")]
    Cancelled,

    #[error("run timed out after {0:?}")]
    TimedOut(Duration),
}

impl RunnerError {
    /// True for errors caused by the request itself, as opposed to the run.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential | Self::EmptyTask | Self::UnsupportedModel(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_run_keeps_context_chain() {
        let err = anyhow::anyhow!("connection reset").context("LLM request failed");
        let msg = RunnerError::SessionRun(err).to_string();
        assert_eq!(msg, "LLM request failed: connection reset");
    }

    #[test]
    fn input_errors_are_classified() {
        assert!(RunnerError::MissingCredential.is_input_error());
        assert!(RunnerError::UnsupportedModel("x".into()).is_input_error());
        assert!(!RunnerError::Cancelled.is_input_error());
        assert!(!RunnerError::TimedOut(Duration::from_secs(3)).is_input_error());
    }

    #[test]
    fn timeout_message_in_seconds() {
        let msg = RunnerError::TimedOut(Duration::from_secs(90)).to_string();
        assert_eq!(msg, "run timed out after 90s");
    }
}
