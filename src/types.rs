use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, RunnerError};

/// Separator appended after every terminal fragment in the aggregated text.
pub const FRAGMENT_SEPARATOR: &str = "\n\n";

/// Chat models the agent can be driven by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelId {
    #[default]
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
}

impl ModelId {
    pub const ALL: [ModelId; 2] = [ModelId::Gpt4oMini, ModelId::Gpt35Turbo];

    /// Identifier sent to the chat-completions endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Gpt4oMini => "gpt-4o-mini",
            ModelId::Gpt35Turbo => "gpt-3.5-turbo",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self> {
        ModelId::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| RunnerError::UnsupportedModel(s.to_string()))
    }
}

/// API key for the language model. Never printed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// One user-triggered task. Immutable once built.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    task: String,
    model: ModelId,
    credential: Credential,
}

impl TaskRequest {
    pub fn new(task: impl Into<String>, model: ModelId, credential: Credential) -> Self {
        Self {
            task: task.into(),
            model,
            credential,
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Checks the request without touching any resource.
    pub fn validate(&self) -> Result<()> {
        if self.credential.is_blank() {
            return Err(RunnerError::MissingCredential);
        }
        if self.task.trim().is_empty() {
            return Err(RunnerError::EmptyTask);
        }
        Ok(())
    }
}

/// Outcome of a single automation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Set on the step that finished the task.
    pub is_terminal: bool,
    pub extracted_content: Option<String>,
}

impl ActionResult {
    pub fn intermediate(content: Option<String>) -> Self {
        Self {
            is_terminal: false,
            extracted_content: content,
        }
    }

    pub fn terminal(content: impl Into<String>) -> Self {
        Self {
            is_terminal: true,
            extracted_content: Some(content.into()),
        }
    }
}

/// Everything an agent run produced.
#[derive(Debug, Clone, Default)]
pub struct AgentHistory {
    results: Option<Vec<ActionResult>>,
    /// PNG frames, one per step, when frame capture was requested.
    pub frames: Vec<Vec<u8>>,
}

impl AgentHistory {
    pub fn new(results: Vec<ActionResult>) -> Self {
        Self {
            results: Some(results),
            frames: Vec::new(),
        }
    }

    /// A history that never recorded a result sequence.
    pub fn without_results() -> Self {
        Self::default()
    }

    pub fn with_frames(mut self, frames: Vec<Vec<u8>>) -> Self {
        self.frames = frames;
        self
    }

    pub fn action_results(&self) -> Result<&[ActionResult]> {
        self.results
            .as_deref()
            .ok_or_else(|| RunnerError::Extraction("history has no action results".into()))
    }
}

/// Concatenates the content of terminal results, in order.
pub fn aggregate_terminal(results: &[ActionResult]) -> String {
    results
        .iter()
        .filter(|r| r.is_terminal)
        .filter_map(|r| r.extracted_content.as_deref())
        .fold(String::new(), |mut out, content| {
            out.push_str(content);
            out.push_str(FRAGMENT_SEPARATOR);
            out
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

/// The value handed back to the caller, built once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub success: bool,
    pub status: RunStatus,
    pub aggregated_text: String,
    pub error: Option<String>,
    /// Set when closing the browser failed. Does not affect `success`.
    pub cleanup_error: Option<String>,
}

impl RunOutcome {
    pub fn completed(aggregated_text: String) -> Self {
        Self {
            success: true,
            status: RunStatus::Completed,
            aggregated_text,
            error: None,
            cleanup_error: None,
        }
    }

    pub fn failed(err: &RunnerError) -> Self {
        let status = match err {
            RunnerError::Cancelled => RunStatus::Cancelled,
            RunnerError::TimedOut(_) => RunStatus::TimedOut,
            _ => RunStatus::Failed,
        };
        Self {
            success: false,
            status,
            aggregated_text: String::new(),
            error: Some(err.to_string()),
            cleanup_error: None,
        }
    }

    pub fn has_content(&self) -> bool {
        !self.aggregated_text.is_empty()
    }
}
