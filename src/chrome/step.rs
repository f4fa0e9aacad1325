use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Characters kept from a single `Extract` step.
pub const EXTRACT_MAX_CHARS: usize = 2000;

/// A single atomic step the LLM asks the agent to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Step {
    Navigate { url: String },
    WaitFor { selector: String, timeout_ms: u64 },
    TypeInto { selector: String, text: String },
    Click { selector: String },
    PressKey { key: String },
    Extract { selector: String, label: String },
    Screenshot,
    Done { summary: String },
}

impl Step {
    pub fn is_done(&self) -> bool {
        matches!(self, Step::Done { .. })
    }
}

/// What the agent observes after executing a step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageState {
    pub url: String,
    pub title: String,
    pub dom_snapshot: String,
    pub extracted: Option<Extraction>,
    pub error: Option<String>,
}

impl PageState {
    /// The observation message fed back to the LLM.
    pub fn to_observation(&self) -> String {
        let mut observation = format!(
            "Page URL: {}\nTitle: {}\n\nDOM:\n{}",
            self.url, self.title, self.dom_snapshot
        );
        if let Some(ref err) = self.error {
            observation.push_str(&format!("\n\nERROR from last step: {}", err));
        }
        if let Some(ref ext) = self.extracted {
            observation.push_str(&format!("\n\nExtracted [{}]: {}", ext.label, ext.content));
        }
        observation
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub label: String,
    pub content: String,
}

/// Parses one step from an LLM reply, tolerating markdown fences.
pub fn parse_step(reply: &str) -> Result<Step> {
    let cleaned = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(cleaned).with_context(|| format!("Failed to parse LLM step: {}", cleaned))
}

/// Escapes a CSS selector for use inside a single-quoted JS string.
pub(crate) fn js_selector(selector: &str) -> String {
    selector.replace('\\', "\\\\").replace('\'', "\\'")
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
