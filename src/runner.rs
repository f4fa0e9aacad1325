//! Runs one browser-automation task end to end.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::{AgentConfig, AgentSession, AutomationBackend, BrowserConfig, LlmConfig};
use crate::config::RunnerConfig;
use crate::error::{Result, RunnerError};
use crate::guard::SessionGuard;
use crate::types::{RunOutcome, TaskRequest, aggregate_terminal};

/// Sampling temperature for the agent's model. Automation decisions should be
/// reproducible.
pub const AGENT_TEMPERATURE: f32 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    CredentialSet,
    SessionCreated,
    Running,
    Completed,
    Failed,
    Cancelled,
    Closed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

struct Lifecycle(RunState);

impl Lifecycle {
    fn enter(&mut self, next: RunState) {
        debug!(from = %self.0, to = %next, "Run state");
        self.0 = next;
    }
}

/// Executes tasks against an [`AutomationBackend`].
///
/// Each call owns its own browser and agent. The browser is closed before the
/// call returns, whatever the outcome.
pub struct TaskRunner<B: AutomationBackend> {
    backend: Arc<B>,
    config: RunnerConfig,
}

impl<B: AutomationBackend> Clone for TaskRunner<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
        }
    }
}

impl<B: AutomationBackend> TaskRunner<B> {
    pub fn new(backend: B, config: RunnerConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Runs `request` to completion.
    ///
    /// Returns `Err` only for invalid input, in which case nothing was
    /// allocated. Every run failure is reported through the outcome.
    pub async fn execute(&self, request: TaskRequest) -> Result<RunOutcome> {
        self.execute_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), returning a `Cancelled` outcome as
    /// soon as `cancel` fires.
    pub async fn execute_with_cancel(
        &self,
        request: TaskRequest,
        cancel: CancellationToken,
    ) -> Result<RunOutcome> {
        request.validate()?;

        let mut lifecycle = Lifecycle(RunState::Idle);
        let llm_config = LlmConfig {
            model: request.model(),
            temperature: AGENT_TEMPERATURE,
            credential: request.credential().clone(),
        };
        lifecycle.enter(RunState::CredentialSet);

        if cancel.is_cancelled() {
            info!("Run cancelled before start");
            return Ok(RunOutcome::failed(&RunnerError::Cancelled));
        }

        let llm = match self.backend.language_model(&llm_config) {
            Ok(llm) => llm,
            Err(e) => {
                let err = RunnerError::SessionRun(e.context("failed to create language model client"));
                error!(error = %err, "Run failed");
                return Ok(RunOutcome::failed(&err));
            }
        };

        let browser_config = BrowserConfig {
            headless: self.config.headless,
            chrome_path: self.config.chrome_path.clone(),
        };
        let browser = match self.backend.launch_browser(&browser_config).await {
            Ok(browser) => browser,
            Err(e) => {
                let err = RunnerError::SessionRun(e.context("failed to launch browser"));
                error!(error = %err, "Run failed");
                return Ok(RunOutcome::failed(&err));
            }
        };
        let guard = SessionGuard::new(browser);
        lifecycle.enter(RunState::SessionCreated);

        info!(model = %request.model(), task = %request.task(), "Running agent");
        let mut outcome = match self
            .drive(&request, llm, &guard, &cancel, &mut lifecycle)
            .await
        {
            Ok(text) => {
                lifecycle.enter(RunState::Completed);
                info!(chars = text.len(), "Agent task completed");
                RunOutcome::completed(text)
            }
            Err(err) => {
                if matches!(err, RunnerError::Cancelled | RunnerError::TimedOut(_)) {
                    lifecycle.enter(RunState::Cancelled);
                    warn!(error = %err, "Run stopped");
                } else {
                    lifecycle.enter(RunState::Failed);
                    error!(error = %err, "Run failed");
                }
                RunOutcome::failed(&err)
            }
        };

        if let Err(e) = guard.release().await {
            let err = RunnerError::Cleanup(e);
            warn!(error = %err, "Browser close reported an error");
            outcome.cleanup_error = Some(err.to_string());
        }
        lifecycle.enter(RunState::Closed);
        info!("Browser closed");

        Ok(outcome)
    }

    /// Blocking form for callers outside an async context. Must not be called
    /// from within a tokio runtime.
    pub fn execute_blocking(&self, request: TaskRequest) -> Result<RunOutcome> {
        request.validate()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RunnerError::SessionRun(anyhow::Error::new(e).context("failed to start runtime")))?;
        runtime.block_on(self.execute(request))
    }

    async fn drive(
        &self,
        request: &TaskRequest,
        llm: B::Llm,
        guard: &SessionGuard<B::Browser>,
        cancel: &CancellationToken,
        lifecycle: &mut Lifecycle,
    ) -> Result<String> {
        let agent_config = AgentConfig {
            task: request.task().to_string(),
            generate_gif: false,
            max_steps: self.config.max_steps,
        };
        let mut agent = self
            .backend
            .agent(agent_config, llm, guard.browser())
            .map_err(|e| RunnerError::SessionRun(e.context("failed to create agent")))?;

        lifecycle.enter(RunState::Running);
        let timeout = self.config.run_timeout;
        let run = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, agent.run())
                    .await
                    .map_err(|_| RunnerError::TimedOut(limit))?
                    .map_err(RunnerError::SessionRun),
                None => agent.run().await.map_err(RunnerError::SessionRun),
            }
        };

        let history = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RunnerError::Cancelled),
            history = run => history?,
        };

        let results = history.action_results()?;
        debug!(steps = results.len(), "Extracting terminal results");
        Ok(aggregate_terminal(results))
    }
}
