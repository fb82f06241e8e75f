//! Embeddings over an OpenAI-compatible `/embeddings` endpoint.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::EmbedderConfig;
use crate::semantic::embeddings::{ensure_text, EmbedError, Embedder};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiEmbedder {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    dimensions: usize,
    base_url: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: String,
        model: &str,
        dimensions: usize,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, EmbedError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbedError::Failed(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model: model.to_string(),
            dimensions,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Reads the API key from the environment variable named in the config.
    pub fn from_config(config: &EmbedderConfig) -> Result<Self, EmbedError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            EmbedError::Failed(format!("{} is not set", config.api_key_env))
        })?;

        Self::new(
            api_key,
            &config.model,
            config.dimensions,
            config.base_url.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

/// Rate limits and server-side errors are worth another attempt; any other
/// non-success status means the request itself is wrong.
fn classify_status(status: StatusCode, body: &str) -> EmbedError {
    let msg = format!("embedding API error ({status}): {body}");
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        EmbedError::Transient(msg)
    } else {
        EmbedError::Failed(msg)
    }
}

fn classify_transport(err: reqwest::Error) -> EmbedError {
    if err.is_timeout() {
        EmbedError::Transient(format!("embedding request timed out: {err}"))
    } else if err.is_connect() || err.is_request() {
        EmbedError::Transient(format!("embedding request failed: {err}"))
    } else {
        EmbedError::Failed(format!("embedding request failed: {err}"))
    }
}

impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Failed("No embedding returned".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        for text in texts {
            ensure_text(text)?;
        }

        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let mut result: EmbeddingResponse = response
            .json()
            .map_err(|e| EmbedError::Failed(format!("Failed to parse embedding response: {e}")))?;

        if result.data.len() != texts.len() {
            return Err(EmbedError::Failed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }

        result.data.sort_by_key(|d| d.index);

        let embeddings: Vec<Vec<f32>> = result.data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(EmbedError::Failed(format!(
                "model '{}' returned {} dimensions, expected {}",
                self.model,
                bad.len(),
                self.dimensions
            )));
        }

        Ok(embeddings)
    }
}
