//! Headless Chrome backend driven by an OpenAI-compatible model.

mod agent;
mod browser;
mod dom;
mod step;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

pub use agent::{ChromeAgent, LoopSettings, Page, run_steps};
pub use browser::{ChromeBrowser, TabPage};
pub use step::{Extraction, PageState, Step, parse_step};

use crate::backend::{AgentConfig, AutomationBackend, BrowserConfig, LlmConfig};
use crate::config::RunnerConfig;
use crate::llm::OpenAiClient;

pub struct ChromeBackend {
    llm_base_url: String,
    dom_max_chars: usize,
}

impl ChromeBackend {
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            llm_base_url: config.llm_base_url.clone(),
            dom_max_chars: config.dom_snapshot_max_chars,
        }
    }
}

#[async_trait]
impl AutomationBackend for ChromeBackend {
    type Llm = OpenAiClient;
    type Browser = ChromeBrowser;
    type Agent = ChromeAgent<OpenAiClient>;

    fn language_model(&self, config: &LlmConfig) -> Result<OpenAiClient> {
        OpenAiClient::new(config, self.llm_base_url.clone())
    }

    async fn launch_browser(&self, config: &BrowserConfig) -> Result<ChromeBrowser> {
        let config = config.clone();
        tokio::task::spawn_blocking(move || ChromeBrowser::launch(&config))
            .await
            .context("browser launch panicked")?
    }

    fn agent(
        &self,
        config: AgentConfig,
        llm: OpenAiClient,
        browser: Arc<ChromeBrowser>,
    ) -> Result<ChromeAgent<OpenAiClient>> {
        Ok(ChromeAgent::new(config, llm, browser, self.dom_max_chars))
    }
}
