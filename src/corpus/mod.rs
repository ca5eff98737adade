//! Dataset preparation.
//!
//! Splits a source article CSV into numbered partitions and encodes the partitioned corpus into
//! the embedding matrix consumed by the vector index.


use std::borrow::Cow;
use std::fs;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::config::DatasetConfig;
use crate::embeddings::CorpusEncoder;
use crate::index::EmbeddingMatrix;
use crate::partitions::{ArticleRow, LocalPartitions, PartitionSource, parse_partition};
use crate::{NewsError, Result};

/// Number of articles sent to the encoder per call while building the corpus
const ENCODE_BATCH_SIZE: usize = 64;

/// How a source dataset is divided into partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionSplit {
    /// Fixed number of rows per partition
    Size(usize),
    /// Fixed number of partitions, the last one may be shorter
    Count(usize),
}

/// Result of partitioning a source dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionSummary {
    pub rows: usize,
    pub partitions: usize,
    pub partition_size: usize,
}

/// Split `source` into `{base_name}_part_{n}.csv` files under the dataset's partition directory
///
/// Rows receive a 1-based `Index` in source order. With [`PartitionSplit::Count`] the partition
/// size is rounded up so that every row, including the tail, satisfies
/// `partition = (Index - 1) / partition_size + 1`.
///
/// # Arguments
/// * `source` - CSV with `text`, `link` and `headline` columns, optionally
///   `short_description` and `date`
/// * `dataset` - Dataset layout providing the output directory and base name
/// * `split` - Partition sizing rule
/// * `clean` - Remove the partition directory before writing
#[inline]
pub fn partition_dataset(
    source: &Path,
    dataset: &DatasetConfig,
    split: PartitionSplit,
    clean: bool,
) -> Result<PartitionSummary> {
    let bytes = fs::read(source)?;
    let rows = read_source_rows(&decode_source(&bytes))?;
    if rows.is_empty() {
        return Err(NewsError::Partition(format!(
            "{} contains no articles",
            source.display()
        )));
    }

    let partition_size = match split {
        PartitionSplit::Size(size) => size,
        PartitionSplit::Count(count) => rows.len().div_ceil(count.max(1)),
    };
    if partition_size == 0 {
        return Err(NewsError::Config(
            "partition size must be at least 1".to_string(),
        ));
    }

    let dir = &dataset.partition_dir;
    if clean && dir.is_dir() {
        info!("Removing existing partitions in {}", dir.display());
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;

    let mut partitions = 0;
    for (i, chunk) in rows.chunks(partition_size).enumerate() {
        let path = dir.join(dataset.partition_file_name(i + 1));
        let mut writer = csv::Writer::from_path(&path)
            .map_err(|e| NewsError::Partition(format!("{}: {}", path.display(), e)))?;
        for row in chunk {
            writer
                .serialize(row)
                .map_err(|e| NewsError::Partition(format!("{}: {}", path.display(), e)))?;
        }
        writer.flush()?;
        debug!("Wrote {} rows to {}", chunk.len(), path.display());
        partitions += 1;
    }

    info!(
        "Partitioned {} articles into {} partitions of {} rows",
        rows.len(),
        partitions,
        partition_size
    );

    Ok(PartitionSummary {
        rows: rows.len(),
        partitions,
        partition_size,
    })
}

/// Source files that are not valid UTF-8 are read as Latin-1
fn decode_source(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            debug!("Source is not UTF-8, decoding as Latin-1");
            Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect())
        }
    }
}

fn read_source_rows(content: &str) -> Result<Vec<ArticleRow>> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| NewsError::Partition(format!("Failed to read source header: {}", e)))?
        .clone();

    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let required = |name: &str| {
        column(name).ok_or_else(|| {
            NewsError::Partition(format!("source dataset has no '{}' column", name))
        })
    };
    let text = required("text")?;
    let link = required("link")?;
    let headline = required("headline")?;
    let short_description = column("short_description");
    let date = column("date");

    let mut rows = Vec::new();
    for (position, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| NewsError::Partition(format!("Malformed source row: {}", e)))?;
        let field = |col: Option<usize>| {
            col.and_then(|c| record.get(c))
                .unwrap_or_default()
                .to_string()
        };

        rows.push(ArticleRow {
            index: position as u64 + 1,
            text: field(Some(text)),
            link: field(Some(link)),
            headline: field(Some(headline)),
            short_description: field(short_description),
            date: field(date),
        });
    }

    Ok(rows)
}

/// Read every local partition in order and return the article texts
///
/// Partitions are read from 1 upward until the first absent one. Each row's `Index` must
/// continue the sequence, otherwise the corpus and the partition formula would disagree.
#[inline]
pub fn read_corpus_texts(dataset: &DatasetConfig) -> Result<Vec<String>> {
    let source = LocalPartitions::new(&dataset.partition_dir);
    let mut texts = Vec::new();

    for partition in 1.. {
        let name = dataset.partition_file_name(partition);
        let Some(bytes) = source.fetch_partition(&name)? else {
            break;
        };

        for row in parse_partition(&name, &bytes)? {
            let expected = texts.len() as u64 + 1;
            if row.index != expected {
                return Err(NewsError::Partition(format!(
                    "{} has Index {} where {} was expected",
                    name, row.index, expected
                )));
            }
            texts.push(row.text);
        }
    }

    if texts.is_empty() {
        return Err(NewsError::Partition(format!(
            "no partitions found in {}",
            source.location()
        )));
    }

    Ok(texts)
}

/// Encode the full partitioned corpus, one vector per row in corpus order
#[inline]
pub fn encode_corpus(
    dataset: &DatasetConfig,
    encoder: &dyn CorpusEncoder,
) -> Result<EmbeddingMatrix> {
    let texts = read_corpus_texts(dataset)?;
    info!("Encoding {} articles", texts.len());

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(texts.len() as u64).with_style(
            ProgressStyle::with_template("{bar:40} [{pos}/{len}] Processing articles {msg}")
                .map_err(|e| NewsError::Other(e.into()))?,
        )
    } else {
        ProgressBar::hidden()
    };

    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(ENCODE_BATCH_SIZE) {
        let encoded = encoder.encode(batch)?;
        if encoded.len() != batch.len() {
            return Err(NewsError::Embedding(format!(
                "encoder returned {} vectors for {} articles",
                encoded.len(),
                batch.len()
            )));
        }
        vectors.extend(encoded);
        bar.inc(batch.len() as u64);
    }
    bar.finish_and_clear();

    EmbeddingMatrix::from_rows(&vectors)
}
