
use std::time::Duration;

use tracing::{debug, error, warn};
use url::Url;

use super::PartitionSource;
use crate::config::BucketConfig;
use crate::{NewsError, Result};

const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);
/// Upper bound on a single partition download
const MAX_PARTITION_BYTES: u64 = 512 * 1024 * 1024;

/// Partitions stored as objects in an HTTP-addressable bucket
///
/// Objects are fetched path-style from `{endpoint}/{bucket}/{name}`. Every request carries a
/// global timeout so a stalled connection surfaces as `BackendUnavailable` instead of hanging.
#[derive(Debug, Clone)]
pub struct BucketPartitions {
    bucket_url: Url,
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff: Duration,
}

impl BucketPartitions {
    #[inline]
    pub fn new(config: &BucketConfig) -> Result<Self> {
        let mut endpoint = Url::parse(&config.endpoint).map_err(|e| {
            NewsError::Config(format!("Invalid bucket endpoint {}: {}", config.endpoint, e))
        })?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        let bucket_url = endpoint
            .join(&format!("{}/", config.name.trim_matches('/')))
            .map_err(|e| NewsError::Config(format!("Invalid bucket name {}: {}", config.name, e)))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            bucket_url,
            agent,
            retry_attempts: config.retry_attempts.max(1),
            backoff: DEFAULT_BACKOFF,
        })
    }

    /// Base delay before the first retry, doubled on every further attempt
    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    #[inline]
    pub fn object_url(&self, name: &str) -> Result<Url> {
        self.bucket_url
            .join(name)
            .map_err(|e| NewsError::Config(format!("Invalid object key {}: {}", name, e)))
    }

    fn try_fetch(&self, url: &Url) -> std::result::Result<Vec<u8>, ureq::Error> {
        self.agent.get(url.as_str()).call().and_then(|mut resp| {
            resp.body_mut()
                .with_config()
                .limit(MAX_PARTITION_BYTES)
                .read_to_vec()
        })
    }
}

impl PartitionSource for BucketPartitions {
    fn fetch_partition(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let url = self.object_url(name)?;
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!(
                "Fetching partition {} (attempt {}/{})",
                url, attempt, self.retry_attempts
            );

            match self.try_fetch(&url) {
                Ok(bytes) => {
                    debug!("Fetched {} bytes from {}", bytes.len(), url);
                    return Ok(Some(bytes));
                }
                Err(ureq::Error::StatusCode(404)) => {
                    debug!("Partition {} does not exist", url);
                    return Ok(None);
                }
                Err(ureq::Error::StatusCode(status)) if status >= 500 => {
                    warn!(
                        "Server error (status {}) for {}, attempt {}/{}",
                        status, url, attempt, self.retry_attempts
                    );
                    last_error = Some(format!("HTTP {}", status));
                }
                Err(ureq::Error::StatusCode(status)) => {
                    return Err(NewsError::BackendUnavailable(format!(
                        "{} returned HTTP {}",
                        url, status
                    )));
                }
                Err(
                    error @ (ureq::Error::ConnectionFailed
                    | ureq::Error::HostNotFound
                    | ureq::Error::Timeout(_)
                    | ureq::Error::Io(_)),
                ) => {
                    warn!(
                        "Transport error for {}: {}, attempt {}/{}",
                        url, error, attempt, self.retry_attempts
                    );
                    last_error = Some(error.to_string());
                }
                Err(error) => {
                    return Err(NewsError::BackendUnavailable(format!(
                        "{}: {}",
                        url, error
                    )));
                }
            }

            if attempt < self.retry_attempts {
                let delay = self.backoff * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1);
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
            }
        }

        error!("All retry attempts failed for {}", url);
        Err(NewsError::BackendUnavailable(format!(
            "{} after {} attempts: {}",
            url,
            self.retry_attempts,
            last_error.unwrap_or_else(|| "request failed".to_string())
        )))
    }

    #[inline]
    fn location(&self) -> String {
        self.bucket_url.to_string()
    }
}
