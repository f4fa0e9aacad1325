//! Runs LLM-driven browser automation tasks and extracts their answers.
//!
//! [`TaskRunner`] owns one browser per task and closes it on every exit
//! path. [`JobManager`] runs tasks in the background for the HTTP API.

pub mod backend;
pub mod chrome;
pub mod config;
pub mod error;
pub mod guard;
pub mod jobs;
pub mod llm;
pub mod quiz;
pub mod runner;
pub mod server;
pub mod types;

pub use backend::{AgentConfig, AgentSession, AutomationBackend, BrowserConfig, BrowserHandle, LlmConfig};
pub use config::RunnerConfig;
pub use error::{Result, RunnerError};
pub use jobs::{JobError, JobId, JobManager, JobStatus, JobView};
pub use runner::TaskRunner;
pub use types::{
    ActionResult, AgentHistory, Credential, ModelId, RunOutcome, RunStatus, TaskRequest,
    aggregate_terminal,
};
