use std::{error::Error, path::Path, time::Duration};

use nl2sql_core::engine::{EngineError, GenerationEngine};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::config::EngineSettings;

#[derive(Debug, Clone, Error)]
pub enum HttpEngineError {
    #[error("Model reply did not contain any text")]
    EmptyReply,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

impl ChatResponse {
    fn into_text(self) -> Result<String, HttpEngineError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(HttpEngineError::EmptyReply)
    }
}

/// Model served behind an OpenAI compatible `chat/completions` endpoint.
///
/// Calls block on an owned runtime. The client timeout bounds every call, a
/// timed out call is reported as an engine failure for that attempt.
pub struct HttpEngine {
    client: reqwest::Client,
    runtime: Runtime,
    settings: EngineSettings,
    api_key: String,
}

impl HttpEngine {
    pub fn new(settings: EngineSettings, api_key: String) -> Result<Self, Box<dyn Error>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            runtime: Runtime::new()?,
            settings,
            api_key,
        })
    }

    fn body<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.settings.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, EngineError> {
        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        debug!("Requesting completion from {url}");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.body(prompt))
            .send()
            .await?
            .error_for_status()?;
        let reply: ChatResponse = response.json().await?;
        Ok(reply.into_text()?)
    }
}

impl GenerationEngine for HttpEngine {
    fn generate(&self, prompt: &str) -> Result<String, EngineError> {
        self.runtime.block_on(self.complete(prompt))
    }
}

/// Answers every prompt with the same recorded model output.
pub struct ReplayEngine {
    output: String,
}

impl ReplayEngine {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, Box<dyn Error>> {
        Ok(Self::new(std::fs::read_to_string(path)?))
    }
}

impl GenerationEngine for ReplayEngine {
    fn generate(&self, _: &str) -> Result<String, EngineError> {
        Ok(self.output.clone())
    }
}

pub enum CliEngine {
    Http(HttpEngine),
    Replay(ReplayEngine),
}

impl GenerationEngine for CliEngine {
    fn generate(&self, prompt: &str) -> Result<String, EngineError> {
        match self {
            CliEngine::Http(engine) => engine.generate(prompt),
            CliEngine::Replay(engine) => engine.generate(prompt),
        }
    }
}
