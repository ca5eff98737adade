
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use super::CorpusEncoder;
use crate::config::OllamaConfig;
use crate::{NewsError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 120;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u32 = 2;

/// Embedding client for an Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: u32,
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff: Duration,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .map_err(|e| NewsError::Config(e.to_string()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: Duration::from_secs(1),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Test connection to Ollama server and verify model availability
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models()?;

        if models.iter().any(|m| m.name == self.model) {
            info!(
                "Health check passed for Ollama server at {} with model {}",
                self.base_url, self.model
            );
            Ok(())
        } else {
            let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available_models
            );
            Err(NewsError::Embedding(format!(
                "Model '{}' is not available. Available models: {:?}",
                self.model, available_models
            )))
        }
    }

    /// List all available models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/api/tags")?;
        debug!("Fetching available models from {}", url);

        let response_text = self.make_request_with_retry(|| {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let models_response: ModelsResponse = serde_json::from_str(&response_text)
            .map_err(|e| NewsError::Embedding(format!("Failed to parse models response: {}", e)))?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| NewsError::Config(format!("Failed to build Ollama URL: {}", e)))
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint("/api/embed")?;
        let request_json = serde_json::to_string(&EmbedRequest {
            model: &self.model,
            input: texts,
        })
        .map_err(|e| NewsError::Embedding(format!("Failed to serialize request: {}", e)))?;

        let response_text = self.make_request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: EmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| NewsError::Embedding(format!("Failed to parse embed response: {}", e)))?;

        if response.embeddings.len() != texts.len() {
            return Err(NewsError::Embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings)
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> std::result::Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => return Ok(response_text),
                Err(ureq::Error::StatusCode(status)) if status >= 500 => {
                    warn!(
                        "Server error (status {}), attempt {}/{}",
                        status, attempt, self.retry_attempts
                    );
                    last_error = Some(format!("HTTP {}", status));
                }
                Err(ureq::Error::StatusCode(status)) => {
                    warn!("Client error (status {}), not retrying", status);
                    return Err(NewsError::Network(format!("Client error: HTTP {}", status)));
                }
                Err(
                    error @ (ureq::Error::ConnectionFailed
                    | ureq::Error::HostNotFound
                    | ureq::Error::Timeout(_)
                    | ureq::Error::Io(_)),
                ) => {
                    warn!(
                        "Transport error: {}, attempt {}/{}",
                        error, attempt, self.retry_attempts
                    );
                    last_error = Some(error.to_string());
                }
                Err(error) => {
                    warn!("Non-retryable error: {}", error);
                    return Err(NewsError::Network(format!("Non-retryable error: {}", error)));
                }
            }

            if attempt < self.retry_attempts {
                let delay = self.backoff * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1);
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);
        Err(NewsError::Network(
            last_error.unwrap_or_else(|| "Request failed after retries".to_string()),
        ))
    }
}

impl CorpusEncoder for OllamaClient {
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());
        let mut embeddings = Vec::with_capacity(texts.len());

        // Process in batches to avoid overwhelming the server
        for chunk in texts.chunks(self.batch_size as usize) {
            embeddings.extend(self.embed_single_batch(chunk)?);
        }

        debug!("Generated {} embeddings total", embeddings.len());
        Ok(embeddings)
    }
}
