#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Layout of the on-disk dataset shared by the vector index and the partition store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatasetConfig {
    /// Dense `(N, D)` embedding array, relative paths resolve against the config directory
    pub embedding_cache_path: PathBuf,
    /// Directory holding the local partition files
    pub partition_dir: PathBuf,
    /// Partition files are named `{base_name}_part_{n}.csv`
    pub base_name: String,
    /// Number of rows per partition
    pub partition_size: usize,
    /// Number of partitions produced when splitting a source dataset by count
    pub partition_count: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            embedding_cache_path: PathBuf::from("dataset/embeddings.npy"),
            partition_dir: PathBuf::from("dataset/partitioned_nyt"),
            base_name: "NYTimes".to_string(),
            partition_size: 990,
            partition_count: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Bucket,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: BucketConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BucketConfig {
    /// Base URL of the object storage service, objects live at `{endpoint}/{name}/{key}`
    pub endpoint: String,
    pub name: String,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://s3.amazonaws.com".to_string(),
            name: "hrnewsarticles".to_string(),
            timeout_seconds: 30,
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of related articles returned per query
    pub top_k: usize,
    /// Pasted passages shorter than this are rejected
    pub min_passage_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_passage_chars: 100,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid partition size: {0} (must be at least 1)")]
    InvalidPartitionSize(usize),
    #[error("Invalid partition count: {0} (must be between 1 and 10000)")]
    InvalidPartitionCount(usize),
    #[error("Invalid partition base name: {0:?} (cannot be empty or contain path separators)")]
    InvalidBaseName(String),
    #[error("Invalid bucket name: {0:?} (cannot be empty)")]
    InvalidBucketName(String),
    #[error("Invalid bucket timeout: {0} (must be between 1 and 300 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default base directory, `~/.news-match`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".news-match"))
            .or({
                #[cfg(windows)]
                {
                    dirs::data_dir().map(|data| data.join("news-match"))
                }
                #[cfg(not(windows))]
                {
                    None
                }
            })
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dataset.validate()?;
        self.storage.validate()?;
        self.ollama.validate()?;
        self.search.validate()?;
        Ok(())
    }

    /// Dataset layout with every path resolved against the base directory
    #[inline]
    pub fn resolved_dataset(&self) -> DatasetConfig {
        DatasetConfig {
            embedding_cache_path: self.resolve_path(&self.dataset.embedding_cache_path),
            partition_dir: self.resolve_path(&self.dataset.partition_dir),
            ..self.dataset.clone()
        }
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

impl DatasetConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partition_size == 0 {
            return Err(ConfigError::InvalidPartitionSize(self.partition_size));
        }

        if !(1..=10_000).contains(&self.partition_count) {
            return Err(ConfigError::InvalidPartitionCount(self.partition_count));
        }

        if self.base_name.trim().is_empty()
            || self.base_name.contains('/')
            || self.base_name.contains('\\')
        {
            return Err(ConfigError::InvalidBaseName(self.base_name.clone()));
        }

        Ok(())
    }

    /// File name of a 1-based partition
    #[inline]
    pub fn partition_file_name(&self, partition: usize) -> String {
        format!("{}_part_{}.csv", self.base_name, partition)
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Bucket settings are only checked when that backend is selected
        if self.backend == StorageBackend::Bucket {
            self.bucket.validate()?;
        }
        Ok(())
    }
}

impl BucketConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.endpoint)
            .map_err(|_| ConfigError::InvalidUrl(self.endpoint.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
        }

        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidBucketName(self.name.clone()));
        }

        if !(1..=300).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.top_k) {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }
        Ok(())
    }
}
