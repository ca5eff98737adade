use anyhow::{Context, Result, bail};
use itertools::Itertools;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::NewsError;
use crate::article::fetch_article_text;
use crate::config::Config;
use crate::corpus::{PartitionSplit, partition_dataset};
use crate::embeddings::{CorpusEncoder, OllamaClient};
use crate::index::build_or_load_index;
use crate::partitions::{MetadataTable, PartitionStore};

/// Where the query article comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryInput {
    Passage(String),
    Url(String),
}

/// One related article found for a query
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedArticle {
    pub headline: String,
    pub link: String,
    /// Squared L2 distance between the query and the article embedding
    pub distance: f32,
}

/// Split a source dataset into partitions, recording the resulting partition size
#[inline]
pub fn partition_source(
    config: &mut Config,
    source: &Path,
    partitions: Option<usize>,
    clean: bool,
) -> Result<()> {
    let split = partitions.map_or(
        PartitionSplit::Size(config.dataset.partition_size),
        PartitionSplit::Count,
    );
    let summary = partition_dataset(source, &config.resolved_dataset(), split, clean)
        .with_context(|| format!("Failed to partition {}", source.display()))?;

    println!(
        "Partitioned {} articles into {} files of {} rows",
        summary.rows, summary.partitions, summary.partition_size
    );

    if summary.partition_size != config.dataset.partition_size {
        config.dataset.partition_size = summary.partition_size;
        config
            .save()
            .context("Failed to record the new partition size")?;
        println!(
            "Updated partition_size to {} in {}",
            summary.partition_size,
            config.config_file_path().display()
        );
    }

    Ok(())
}

/// Encode the partitioned corpus into the embedding cache
#[inline]
pub fn build_embeddings(config: &Config, force: bool) -> Result<()> {
    let dataset = config.resolved_dataset();

    if dataset.embedding_cache_path.exists() {
        if !force {
            println!(
                "Embedding cache already exists at {}",
                dataset.embedding_cache_path.display()
            );
            println!("Use --force to rebuild it.");
            return Ok(());
        }
        info!(
            "Removing embedding cache {}",
            dataset.embedding_cache_path.display()
        );
        fs::remove_file(&dataset.embedding_cache_path)?;
    }

    let client = OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?;
    client
        .health_check()
        .context("Ollama is not ready to generate embeddings")?;

    let index = build_or_load_index(&dataset, Some(&client))?;
    println!(
        "Built embedding cache with {} vectors of dimension {} at {}",
        index.len(),
        index.dimension(),
        dataset.embedding_cache_path.display()
    );
    Ok(())
}

/// Embed a passage and return the most similar articles of the corpus
///
/// # Arguments
/// * `config` - Application configuration
/// * `passage` - Query text, at least `search.min_passage_chars` characters
/// * `encoder` - Producer of the query embedding
///
/// # Returns
/// * `Result<Vec<RelatedArticle>>` - Up to `search.top_k` articles ordered by distance
#[inline]
pub fn find_related(
    config: &Config,
    passage: &str,
    encoder: &dyn CorpusEncoder,
) -> Result<Vec<RelatedArticle>> {
    let length = passage.trim().chars().count();
    if length < config.search.min_passage_chars {
        bail!(
            "Passage too short: {} characters, at least {} required",
            length,
            config.search.min_passage_chars
        );
    }

    let dataset = config.resolved_dataset();
    let index = match build_or_load_index(&dataset, None) {
        Err(NewsError::MissingEmbeddingCache(path)) => {
            bail!(
                "No embedding cache at {}. Run 'news-match build' first.",
                path.display()
            );
        }
        other => other?,
    };

    let query = encoder
        .encode_one(passage)
        .context("Failed to embed the query passage")?;
    let hits = index.search(&query, config.search.top_k)?;

    let store = PartitionStore::from_config(config)?;
    let resolution = store.resolve(&hits.indices)?;
    for missing in &resolution.missing {
        warn!(
            "Search result {} has no metadata in partition {}",
            missing.index, missing.partition
        );
    }
    let table = resolution.into_table()?;

    Ok(table
        .into_rows()
        .into_iter()
        .zip(hits.distances)
        .map(|(row, distance)| RelatedArticle {
            headline: row.headline,
            link: row.link,
            distance,
        })
        .collect())
}

/// Search for articles related to a pasted passage or a fetched URL
#[inline]
pub fn search(config: &Config, input: QueryInput) -> Result<()> {
    let passage = match input {
        QueryInput::Passage(text) => text,
        QueryInput::Url(url) => fetch_article_text(&url)?,
    };

    let client = OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?;
    let related = find_related(config, &passage, &client)?;

    if related.is_empty() {
        println!("No related articles found.");
        return Ok(());
    }

    println!("Related articles:");
    for (rank, article) in related.iter().enumerate() {
        println!("{}. {}", rank + 1, article.headline);
        println!("   {} (distance {:.4})", article.link, article.distance);
    }
    Ok(())
}

/// Print the metadata of corpus rows
#[inline]
pub fn lookup(config: &Config, indices: &[usize]) -> Result<()> {
    let store = PartitionStore::from_config(config)?;
    let table: MetadataTable = store.resolve_rows(indices)?;

    for (row, article) in indices.iter().zip(table.rows()) {
        println!("[{}] {}", row, article.headline);
        println!("   {}", article.link);
        if !article.date.is_empty() || !article.short_description.is_empty() {
            println!(
                "   {}",
                [article.date.as_str(), article.short_description.as_str()]
                    .iter()
                    .filter(|s| !s.is_empty())
                    .join(" | ")
            );
        }
    }
    Ok(())
}
