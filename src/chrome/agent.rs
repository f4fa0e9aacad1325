//! The LLM-directed step loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::browser::ChromeBrowser;
use super::step::{Extraction, PageState, Step, parse_step};
use crate::backend::{AgentConfig, AgentSession};
use crate::llm::{ChatMessage, ChatModel};
use crate::types::{ActionResult, AgentHistory};

const SYSTEM_PROMPT: &str = r#"You control a real Chrome browser to complete the user's task. Reply with exactly ONE step per message, as a bare JSON object.

Steps:
- {"action":"Navigate","url":"https://..."}
- {"action":"WaitFor","selector":"[data-eid=\"[e0]\"]","timeout_ms":5000}
- {"action":"TypeInto","selector":"[data-eid=\"[e0]\"]","text":"search query"}
- {"action":"Click","selector":"[data-eid=\"[e0]\"]"}
- {"action":"PressKey","key":"Enter"}
- {"action":"Extract","selector":"body","label":"main_content"}
- {"action":"Screenshot"}
- {"action":"Done","summary":"<the final answer for the user>"}

Rules:
1. No markdown and no prose around the JSON.
2. Target elements by the [eN] ids in the DOM snapshot, using the selector [data-eid="[eN]"].
3. After each step you receive the page URL, title and DOM. Decide the next step from that.
4. Fill inputs with TypeInto, then submit with PressKey "Enter" or Click.
5. When the task is answered, use Done. The summary is what the user sees, so put the answer in it.
6. On errors try another approach. After three failed attempts, use Done and explain."#;

/// A page the loop can act on. Calls block and are run off the async runtime.
pub trait Page: Clone + Send + Sync + 'static {
    /// Executes one non-terminal step, returning extracted content if any.
    fn perform(&self, step: &Step) -> Result<Option<Extraction>>;

    fn observe(&self, dom_max_chars: usize) -> PageState;

    fn screenshot(&self) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub max_steps: usize,
    pub dom_max_chars: usize,
    pub capture_frames: bool,
}

/// Asks the model for steps and runs them on `page` until `Done` or the step
/// limit. Every turn yields one [`ActionResult`]; only `Done` is terminal.
pub async fn run_steps<M: ChatModel, P: Page>(
    model: &M,
    page: P,
    task: &str,
    settings: &LoopSettings,
) -> Result<AgentHistory> {
    let mut conversation = vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Task: {}\n\nThe browser is on a blank page. What is your next step?",
            task
        )),
    ];
    let mut results = Vec::new();
    let mut frames = Vec::new();

    for number in 1..=settings.max_steps {
        debug!(step = number, "Asking LLM for next step");
        let reply = model
            .complete(&conversation)
            .await
            .context("LLM call failed")?;
        conversation.push(ChatMessage::assistant(reply.clone()));

        let step = match parse_step(&reply) {
            Ok(step) => step,
            Err(e) => {
                warn!(step = number, error = %format!("{:#}", e), "Unparseable step");
                results.push(ActionResult::intermediate(None));
                conversation.push(ChatMessage::user(format!(
                    "ERROR: {:#}. Reply with a single JSON step.",
                    e
                )));
                continue;
            }
        };

        if let Step::Done { summary } = step {
            info!(step = number, "Agent reported done");
            results.push(ActionResult::terminal(summary));
            return Ok(AgentHistory::new(results).with_frames(frames));
        }

        info!(step = number, action = ?step, "Executing step");
        let page = page.clone();
        let dom_max_chars = settings.dom_max_chars;
        let capture = settings.capture_frames;
        let (state, frame) = tokio::task::spawn_blocking(move || {
            let (extracted, error) = match page.perform(&step) {
                Ok(extracted) => (extracted, None),
                Err(e) => (None, Some(format!("{:#}", e))),
            };
            let mut state = page.observe(dom_max_chars);
            state.extracted = extracted;
            state.error = error;
            let frame = if capture { page.screenshot().ok() } else { None };
            (state, frame)
        })
        .await
        .context("step executor panicked")?;

        if let Some(ref err) = state.error {
            warn!(step = number, error = %err, "Step error");
        }
        frames.extend(frame);
        results.push(ActionResult::intermediate(
            state.extracted.as_ref().map(|e| e.content.clone()),
        ));
        conversation.push(ChatMessage::user(state.to_observation()));
    }

    warn!(max_steps = settings.max_steps, "Step limit reached");
    Ok(AgentHistory::new(results).with_frames(frames))
}

/// Agent session over a Chrome tab and a chat model.
pub struct ChromeAgent<M: ChatModel> {
    model: M,
    browser: Arc<ChromeBrowser>,
    task: String,
    settings: LoopSettings,
}

impl<M: ChatModel> ChromeAgent<M> {
    pub fn new(config: AgentConfig, model: M, browser: Arc<ChromeBrowser>, dom_max_chars: usize) -> Self {
        Self {
            model,
            browser,
            task: config.task,
            settings: LoopSettings {
                max_steps: config.max_steps,
                dom_max_chars,
                capture_frames: config.generate_gif,
            },
        }
    }
}

#[async_trait]
impl<M: ChatModel + 'static> AgentSession for ChromeAgent<M> {
    async fn run(&mut self) -> Result<AgentHistory> {
        let browser = Arc::clone(&self.browser);
        let page = tokio::task::spawn_blocking(move || browser.open_page())
            .await
            .context("browser task panicked")??;
        run_steps(&self.model, page, &self.task, &self.settings).await
    }
}
