use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::completion::CompletionBackend;
use crate::config::ModelConfig;

const SYSTEM_PROMPT: &str = "Continue with exactly one word. Output only that word.";

pub struct OpenAiBackend {
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    client: Client,
}

impl OpenAiBackend {
    pub fn new(config: &ModelConfig, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(anyhow!("openai backend requires a non-empty API key"));
        }
        if config.base_url.trim().is_empty() {
            return Err(anyhow!("model.base_url is empty"));
        }
        if config.model.trim().is_empty() {
            return Err(anyhow!("model.model is empty"));
        }

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens.max(1),
            client: Client::builder()
                .timeout(Duration::from_millis(config.timeout_ms.max(1)))
                .build()
                .context("failed to build HTTP client")?,
        })
    }

    fn build_request(&self, prompt: &str, count: u32) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_tokens: self.max_tokens,
            n: count,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn request_completions(&self, prompt: &str, count: u32) -> Result<Vec<String>> {
        let endpoint = format!("{}/chat/completions", self.base_url);
        let payload = self.build_request(prompt, count);

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("failed to call completion API")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read completion response body")?;

        if !status.is_success() {
            return Err(anyhow!("completion API failed ({status}): {body}"));
        }

        parse_choices(&body)
    }
}

fn parse_choices(body: &str) -> Result<Vec<String>> {
    let parsed: ChatResponse =
        serde_json::from_str(body).context("invalid completion response format")?;
    Ok(parsed
        .choices
        .into_iter()
        .filter_map(|choice| choice.message.content)
        .collect())
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    n: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
