use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Text → fixed-dimension vector transform shared by index build and queries.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of inputs, one vector per input, in input order.
    async fn embed(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Largest batch accepted by a single `embed` call.
    fn batch_size(&self) -> usize {
        64
    }
}

/// Embeddings client for OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_retries: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn new(api_key: &str, base_url: &str, model: &str, batch_size: usize) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing embedding API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");
        anyhow::ensure!(batch_size > 0, "embedding batch size must be positive");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create embedding HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key: api_key.trim().to_string(),
            max_retries: 3,
            batch_size,
        })
    }

    fn should_retry(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn is_retryable_error(err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect() || err.is_body() || err.is_request()
    }

    fn retry_backoff(attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        Duration::from_millis(500 * (1 << capped))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        anyhow::ensure!(
            inputs.len() <= self.batch_size,
            "batch of {} exceeds configured max {}",
            inputs.len(),
            self.batch_size
        );

        let mut attempt = 0usize;
        loop {
            let request = EmbeddingRequest {
                model: &self.model,
                input: inputs,
            };
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let mut parsed: EmbeddingResponse = resp
                            .json()
                            .await
                            .context("Failed to parse embedding response")?;
                        parsed.data.sort_by_key(|entry| entry.index);
                        anyhow::ensure!(
                            parsed.data.len() == inputs.len(),
                            "embedding service returned {} vectors for {} inputs",
                            parsed.data.len(),
                            inputs.len()
                        );
                        debug!(count = inputs.len(), "embedding batch complete");
                        return Ok(parsed.data.into_iter().map(|e| e.embedding).collect());
                    }

                    let body = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if Self::should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(%status, attempt, "embedding request failed, retrying");
                        tokio::time::sleep(Self::retry_backoff(attempt)).await;
                        continue;
                    }
                    anyhow::bail!("embedding request failed ({}): {}", status, body);
                }
                Err(err) => {
                    if Self::is_retryable_error(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(error = %err, attempt, "embedding transport error, retrying");
                        tokio::time::sleep(Self::retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(err).context("embedding request failed");
                }
            }
        }
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
