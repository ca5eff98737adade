use itertools::Itertools;
use thiserror::Error;

use crate::partitions::MissingRow;

pub type Result<T> = std::result::Result<T, NewsError>;

#[derive(Error, Debug)]
pub enum NewsError {
    #[error("No embedding cache at {0} and no encoder was supplied to build one")]
    MissingEmbeddingCache(std::path::PathBuf),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Metadata rows not found for indices {}", format_missing(.0))]
    RowNotFound(Vec<MissingRow>),

    #[error("Partition backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Invalid embedding cache: {0}")]
    InvalidEmbeddingCache(String),

    #[error("Partition error: {0}")]
    Partition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

fn format_missing(missing: &[MissingRow]) -> String {
    missing
        .iter()
        .map(|row| format!("{} (partition {})", row.index, row.partition))
        .join(", ")
}

pub mod article;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod index;
pub mod partitions;
