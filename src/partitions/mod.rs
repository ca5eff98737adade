//! Partitioned article metadata.
//!
//! The metadata for the corpus is split into fixed-size CSV partitions named
//! `{base_name}_part_{n}.csv`. Corpus row `r` (0-based, shared with the vector index) is stored
//! with `Index = r + 1` in partition `r / partition_size + 1`. Resolution loads each partition
//! it needs at most once per call and drops them all when the call returns.

pub mod backend;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Config, DatasetConfig, StorageBackend};
use crate::{NewsError, Result};

pub use backend::{BucketPartitions, LocalPartitions, PartitionSource};

/// Header shared by every partition file
pub const PARTITION_COLUMNS: [&str; 6] = [
    "Index",
    "text",
    "link",
    "headline",
    "short_description",
    "date",
];

/// One article's metadata as stored in a partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRow {
    /// 1-based position of the article in the corpus
    #[serde(rename = "Index")]
    pub index: u64,
    #[serde(default)]
    pub text: String,
    pub link: String,
    pub headline: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub date: String,
}

/// A search result row that has no metadata in its expected partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingRow {
    /// 0-based corpus row
    pub index: usize,
    /// 1-based partition the row should live in
    pub partition: usize,
}

/// Resolved metadata rows, in request order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataTable {
    rows: Vec<ArticleRow>,
}

impl MetadataTable {
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn rows(&self) -> &[ArticleRow] {
        &self.rows
    }

    #[inline]
    pub fn into_rows(self) -> Vec<ArticleRow> {
        self.rows
    }

    #[inline]
    pub fn headlines(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row.headline.as_str())
    }

    #[inline]
    pub fn links(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row.link.as_str())
    }
}

/// Outcome of resolving a batch of indices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub table: MetadataTable,
    pub missing: Vec<MissingRow>,
}

impl Resolution {
    /// Turn any missing rows into a `RowNotFound` error
    #[inline]
    pub fn into_table(self) -> Result<MetadataTable> {
        if self.missing.is_empty() {
            Ok(self.table)
        } else {
            Err(NewsError::RowNotFound(self.missing))
        }
    }
}

/// 1-based partition holding a 0-based corpus row
#[inline]
pub fn partition_for(row: usize, partition_size: usize) -> usize {
    row / partition_size + 1
}

/// Parse the rows of one partition file in file order
#[inline]
pub fn parse_partition(name: &str, bytes: &[u8]) -> Result<Vec<ArticleRow>> {
    csv::Reader::from_reader(bytes)
        .deserialize::<ArticleRow>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| NewsError::Partition(format!("Failed to parse {}: {}", name, e)))
}

/// A loaded partition keyed by its `Index` column
#[derive(Debug, Clone, Default)]
struct PartitionTable {
    rows: HashMap<u64, ArticleRow>,
}

impl PartitionTable {
    fn parse(name: &str, bytes: &[u8]) -> Result<Self> {
        let rows = parse_partition(name, bytes)?
            .into_iter()
            .map(|row| (row.index, row))
            .collect();
        Ok(Self { rows })
    }

    fn get(&self, index: u64) -> Option<&ArticleRow> {
        self.rows.get(&index)
    }
}

/// Resolves corpus rows to article metadata through a partition backend
#[derive(Debug)]
pub struct PartitionStore {
    source: Box<dyn PartitionSource>,
    dataset: DatasetConfig,
}

impl PartitionStore {
    #[inline]
    pub fn new(source: Box<dyn PartitionSource>, dataset: DatasetConfig) -> Result<Self> {
        if dataset.partition_size == 0 {
            return Err(NewsError::Config(
                "partition_size must be at least 1".to_string(),
            ));
        }
        Ok(Self { source, dataset })
    }

    /// Build a store over the backend selected in the configuration
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let dataset = config.resolved_dataset();
        let source: Box<dyn PartitionSource> = match config.storage.backend {
            StorageBackend::Local => Box::new(LocalPartitions::new(&dataset.partition_dir)),
            StorageBackend::Bucket => Box::new(BucketPartitions::new(&config.storage.bucket)?),
        };
        debug!("Partition store reading from {}", source.location());
        Self::new(source, dataset)
    }

    #[inline]
    pub fn partition_size(&self) -> usize {
        self.dataset.partition_size
    }

    /// Resolve rows, reporting missing ones alongside the found metadata
    ///
    /// # Arguments
    /// * `indices` - 0-based corpus rows in any order, duplicates allowed
    ///
    /// # Returns
    /// * `Result<Resolution>` - Rows in request order plus every index without metadata.
    ///   Errors only when a partition cannot be fetched or parsed.
    #[inline]
    pub fn resolve(&self, indices: &[usize]) -> Result<Resolution> {
        // Batch-local, dropped on return
        let mut loaded: HashMap<usize, Option<PartitionTable>> = HashMap::new();
        let mut resolution = Resolution::default();

        for &row in indices {
            let partition = partition_for(row, self.dataset.partition_size);

            let table = match loaded.entry(partition) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(self.load_partition(partition)?),
            };

            match table.as_ref().and_then(|t| t.get(row as u64 + 1)) {
                Some(article) => resolution.table.rows.push(article.clone()),
                None => {
                    debug!("Row {} missing from partition {}", row, partition);
                    resolution.missing.push(MissingRow {
                        index: row,
                        partition,
                    });
                }
            }
        }

        debug!(
            "Resolved {} of {} rows from {} partitions",
            resolution.table.len(),
            indices.len(),
            loaded.len()
        );
        Ok(resolution)
    }

    /// Resolve rows, failing with `RowNotFound` if any index has no metadata
    #[inline]
    pub fn resolve_rows(&self, indices: &[usize]) -> Result<MetadataTable> {
        self.resolve(indices)?.into_table()
    }

    fn load_partition(&self, partition: usize) -> Result<Option<PartitionTable>> {
        let name = self.dataset.partition_file_name(partition);
        match self.source.fetch_partition(&name)? {
            Some(bytes) => {
                let table = PartitionTable::parse(&name, &bytes)?;
                debug!("Loaded partition {} with {} rows", name, table.rows.len());
                Ok(Some(table))
            }
            None => Ok(None),
        }
    }
}
