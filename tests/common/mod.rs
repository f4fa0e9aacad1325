#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use browser_task_runner::{
    ActionResult, AgentConfig, AgentHistory, AgentSession, AutomationBackend, BrowserConfig,
    BrowserHandle, Credential, LlmConfig, ModelId, TaskRequest,
};

/// What the mock agent's `run` does.
#[derive(Clone)]
pub enum Script {
    Results(Vec<ActionResult>),
    /// Returns a history with no result sequence.
    Malformed,
    Fail(String),
    /// Never finishes.
    Hang,
    /// Sleeps, then answers with the credential it was built with.
    EchoCredential(Duration),
    /// Panics inside the agent.
    Panic,
}

#[derive(Default)]
pub struct Calls {
    pub llms: AtomicUsize,
    pub launches: AtomicUsize,
    pub agents: AtomicUsize,
    pub closes: AtomicUsize,
    pub llm_config: Mutex<Option<LlmConfig>>,
    pub browser_config: Mutex<Option<BrowserConfig>>,
    pub agent_config: Mutex<Option<AgentConfig>>,
}

impl Calls {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        Self::count(&self.closes)
    }

    pub fn created(&self) -> usize {
        Self::count(&self.llms) + Self::count(&self.launches) + Self::count(&self.agents)
    }
}

pub struct MockBackend {
    pub calls: Arc<Calls>,
    script: Script,
    pub fail_launch: bool,
    pub fail_agent: bool,
    pub fail_close: bool,
}

impl MockBackend {
    pub fn new(script: Script) -> Self {
        Self {
            calls: Arc::new(Calls::default()),
            script,
            fail_launch: false,
            fail_agent: false,
            fail_close: false,
        }
    }
}

pub struct MockLlm {
    credential: Credential,
}

pub struct MockBrowser {
    calls: Arc<Calls>,
    fail_close: bool,
}

#[async_trait]
impl BrowserHandle for MockBrowser {
    async fn close(&self) -> Result<()> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(anyhow!("chrome did not exit"));
        }
        Ok(())
    }
}

pub struct MockAgent {
    script: Script,
    llm: MockLlm,
    _browser: Arc<MockBrowser>,
}

#[async_trait]
impl AgentSession for MockAgent {
    async fn run(&mut self) -> Result<AgentHistory> {
        match &self.script {
            Script::Results(results) => Ok(AgentHistory::new(results.clone())),
            Script::Malformed => Ok(AgentHistory::without_results()),
            Script::Fail(message) => Err(anyhow!(message.clone())),
            Script::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Script::EchoCredential(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(AgentHistory::new(vec![ActionResult::terminal(
                    self.llm.credential.expose(),
                )]))
            }
            Script::Panic => panic!("agent blew up"),
        }
    }
}

#[async_trait]
impl AutomationBackend for MockBackend {
    type Llm = MockLlm;
    type Browser = MockBrowser;
    type Agent = MockAgent;

    fn language_model(&self, config: &LlmConfig) -> Result<MockLlm> {
        self.calls.llms.fetch_add(1, Ordering::SeqCst);
        *self.calls.llm_config.lock().unwrap() = Some(config.clone());
        Ok(MockLlm {
            credential: config.credential.clone(),
        })
    }

    async fn launch_browser(&self, config: &BrowserConfig) -> Result<MockBrowser> {
        self.calls.launches.fetch_add(1, Ordering::SeqCst);
        *self.calls.browser_config.lock().unwrap() = Some(config.clone());
        if self.fail_launch {
            return Err(anyhow!("chrome not found"));
        }
        Ok(MockBrowser {
            calls: Arc::clone(&self.calls),
            fail_close: self.fail_close,
        })
    }

    fn agent(
        &self,
        config: AgentConfig,
        llm: MockLlm,
        browser: Arc<MockBrowser>,
    ) -> Result<MockAgent> {
        self.calls.agents.fetch_add(1, Ordering::SeqCst);
        *self.calls.agent_config.lock().unwrap() = Some(config);
        if self.fail_agent {
            return Err(anyhow!("agent rejected the task"));
        }
        Ok(MockAgent {
            script: self.script.clone(),
            llm,
            _browser: browser,
        })
    }
}

pub fn request(task: &str, key: &str) -> TaskRequest {
    TaskRequest::new(task, ModelId::Gpt4oMini, Credential::new(key))
}
