//! Embedding providers.
//!
//! - **[`OpenAIEmbedder`]** calls the OpenAI embeddings API with retry and
//!   backoff.
//! - **[`DisabledEmbedder`]** fails every call; it stands in during dry
//!   runs, which never embed.
//!
//! Both implement the core [`Embedder`] trait.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Input longer than the configured character budget is rejected before
//! any request is made.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use kbsync_core::embedding::{check_input_len, validate_embedding, Embedder};

use crate::config::EmbeddingConfig;

/// An embedder that always fails.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

/// Embedder backed by `POST {api_base}/embeddings`.
///
/// Requires `OPENAI_API_KEY` (or `embedding.api_key`).
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    endpoint: String,
    max_retries: u32,
    max_input_chars: usize,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            dims: config.dims,
            endpoint: format!("{}/embeddings", config.api_base.trim_end_matches('/')),
            max_retries: config.max_retries,
            max_input_chars: config.max_input_chars,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        check_input_len(text, self.max_input_chars)?;

        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = retry_delay(attempt);
                debug!(attempt, delay_secs = delay.as_secs(), "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        let vector = parse_openai_response(&json)?;
                        validate_embedding(&vector, self.dims)?;
                        return Ok(vector);
                    }

                    // Rate limited or server error, retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Embedding failed after retries")))
    }
}

/// Delay before retry number `attempt` (1-based).
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

/// Extract the single `data[0].embedding` vector from a response.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let item = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let embedding = item
        .get("embedding")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;

    embedding
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow!("Invalid OpenAI response: non-numeric value at position {}", i))
        })
        .collect()
}
