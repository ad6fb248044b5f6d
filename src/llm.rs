use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Failures reported by the chat completion endpoint.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// HTTP 429: quota exhausted or rate limited.
    #[error("LLM rate limited ({status}): {body}")]
    RateLimited { status: u16, body: String },

    #[error("LLM service error ({status}): {body}")]
    Service { status: u16, body: String },

    #[error("LLM returned an empty completion")]
    EmptyResponse,
}

impl LlmError {
    fn from_status(status: StatusCode, body: String) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited {
                status: status.as_u16(),
                body,
            }
        } else {
            Self::Service {
                status: status.as_u16(),
                body,
            }
        }
    }
}

/// One prompt in, one completion out.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    sub_model: String,
    api_key: String,
}

impl LlmClient {
    /// The API key is mandatory; its absence is a startup failure.
    pub fn from_env() -> Result<Self> {
        let api_key = dotenv::var("LLM_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .context("LLM_API_KEY is required")?;
        let base_url = dotenv::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model = dotenv::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let sub_model = dotenv::var("LLM_SUB_MODEL").unwrap_or_else(|_| model.clone());

        Self::new(api_key, base_url, model, sub_model)
    }

    pub fn new(api_key: String, base_url: String, model: String, sub_model: String) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing LLM API key");

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            model,
            sub_model,
            api_key: api_key.trim().to_string(),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") || base.ends_with("/openai") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    /// Non-streaming chat completion.
    pub async fn chat(&self, messages: &[Message], model_override: Option<&str>) -> Result<String> {
        let model = model_override.unwrap_or(&self.model);
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": 0.3,
            "max_tokens": 2048,
        });

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("LLM request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("Failed to read LLM response")?;
        if !status.is_success() {
            return Err(LlmError::from_status(status, text).into());
        }

        let json: serde_json::Value =
            serde_json::from_str(&text).context("Failed to parse LLM JSON")?;

        // choices[0].message.content may be null
        let content = json["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .unwrap_or("")
            .to_string();

        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }
        debug!(model, response_len = content.len(), "chat completion received");
        Ok(content)
    }

    /// Handle bound to the answer model.
    pub fn answer_model(self: &Arc<Self>) -> ChatModel {
        ChatModel {
            llm: self.clone(),
            model: self.model.clone(),
        }
    }

    /// Handle bound to the summarization (sub) model.
    pub fn summary_model(self: &Arc<Self>) -> ChatModel {
        ChatModel {
            llm: self.clone(),
            model: self.sub_model.clone(),
        }
    }
}

/// A [`TextModel`] that sends the prompt as a single user message to one model.
pub struct ChatModel {
    llm: Arc<LlmClient>,
    model: String,
}

impl ChatModel {
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextModel for ChatModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let messages = vec![Message {
            role: "user".to_string(),
            content: prompt.to_string(),
        }];
        self.llm.chat(&messages, Some(&self.model)).await
    }
}
