//! OpenAI-compatible chat-completions client.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::backend::LlmConfig;
use crate::types::{Credential, ModelId};

/// A message in the conversation history sent to the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Anything that can answer a chat conversation with one reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    model: ModelId,
    temperature: f32,
    credential: Credential,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, base_url: impl Into<String>) -> Result<Self> {
        if config.credential.is_blank() {
            return Err(anyhow!("no API key configured for the language model"));
        }
        Ok(Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: config.model,
            temperature: config.temperature,
            credential: config.credential.clone(),
        })
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        if messages.len() > 40 {
            warn!(messages = messages.len(), "Conversation history is long");
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .json(&json!({
                "model": self.model.as_str(),
                "messages": messages,
                "temperature": self.temperature,
            }))
            .send()
            .await
            .context("LLM request failed")?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .context("LLM response was not JSON")?;

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error");
            return Err(anyhow!("OpenAI API error ({}): {}", status, message));
        }

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("No content in LLM response: {}", body))?;

        debug!(reply = %content, "LLM replied");
        Ok(content.to_string())
    }
}
