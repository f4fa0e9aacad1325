//! Collaborator seams the runner drives: language model, browser and agent.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{AgentHistory, Credential, ModelId};

/// How the language model client is built. Carries the credential so that
/// no process-wide state is needed to authenticate.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: ModelId,
    pub temperature: f32,
    pub credential: Credential,
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub task: String,
    /// Record a frame after each step.
    pub generate_gif: bool,
    pub max_steps: usize,
}

/// A launched browser.
#[async_trait]
pub trait BrowserHandle: Send + Sync + 'static {
    /// Shuts the browser down. Callers must not assume this is idempotent.
    async fn close(&self) -> Result<()>;
}

/// An agent bound to a task, a language model and a browser.
#[async_trait]
pub trait AgentSession: Send {
    /// Drives the task to completion. This is the long-running call.
    async fn run(&mut self) -> Result<AgentHistory>;
}

/// Factory for the collaborators of one run.
#[async_trait]
pub trait AutomationBackend: Send + Sync + 'static {
    type Llm: Send;
    type Browser: BrowserHandle;
    type Agent: AgentSession;

    fn language_model(&self, config: &LlmConfig) -> Result<Self::Llm>;

    async fn launch_browser(&self, config: &BrowserConfig) -> Result<Self::Browser>;

    fn agent(
        &self,
        config: AgentConfig,
        llm: Self::Llm,
        browser: Arc<Self::Browser>,
    ) -> Result<Self::Agent>;
}
