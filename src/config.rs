use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_STEPS: usize = 25;
pub const DEFAULT_DOM_SNAPSHOT_MAX_CHARS: usize = 4000;
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_JOB_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Settings shared by every run a [`TaskRunner`](crate::TaskRunner) executes.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Wall-clock limit for one agent run. `None` waits indefinitely.
    pub run_timeout: Option<Duration>,
    /// Upper bound on LLM turns per task.
    pub max_steps: usize,
    pub headless: bool,
    /// Chrome binary. Auto-detected by `headless_chrome` when unset.
    pub chrome_path: Option<PathBuf>,
    /// Base URL of an OpenAI-compatible API.
    pub llm_base_url: String,
    pub dom_snapshot_max_chars: usize,
    /// Concurrent jobs the job manager runs.
    pub workers: usize,
    /// How long a finished job stays visible before it is pruned.
    pub job_retention: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            run_timeout: None,
            max_steps: DEFAULT_MAX_STEPS,
            headless: true,
            chrome_path: None,
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            dom_snapshot_max_chars: DEFAULT_DOM_SNAPSHOT_MAX_CHARS,
            workers: 2,
            job_retention: DEFAULT_JOB_RETENTION,
        }
    }
}

impl RunnerConfig {
    pub fn with_run_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_chrome_path(mut self, path: Option<PathBuf>) -> Self {
        self.chrome_path = path;
        self
    }

    pub fn with_llm_base_url(mut self, url: impl Into<String>) -> Self {
        self.llm_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_job_retention(mut self, retention: Duration) -> Self {
        self.job_retention = retention;
        self
    }
}
