//! Exact nearest-neighbor search over the embedding corpus.
//!
//! The index is a flat scan with squared Euclidean distance. Results are ordered by
//! `(distance, row)` so equal distances always come back in ascending row order.

pub mod npy;


use std::cmp::Ordering;

use tracing::{debug, info};

use crate::config::DatasetConfig;
use crate::corpus::encode_corpus;
use crate::embeddings::CorpusEncoder;
use crate::{NewsError, Result};

pub use npy::EmbeddingMatrix;

/// Flat L2 index over an immutable embedding matrix
#[derive(Debug, Clone)]
pub struct VectorIndex {
    vectors: EmbeddingMatrix,
}

/// Parallel distance/row sequences returned by [`VectorIndex::search`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    /// Squared L2 distances, non-decreasing
    pub distances: Vec<f32>,
    /// 0-based corpus rows matching `distances`
    pub indices: Vec<usize>,
}

impl SearchHits {
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.indices
            .iter()
            .copied()
            .zip(self.distances.iter().copied())
    }
}

impl VectorIndex {
    #[inline]
    pub fn new(vectors: EmbeddingMatrix) -> Self {
        Self { vectors }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vectors.rows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.vectors.dimension()
    }

    #[inline]
    pub fn vectors(&self) -> &EmbeddingMatrix {
        &self.vectors
    }

    /// Find the `k` nearest corpus rows to `query`
    ///
    /// # Arguments
    /// * `query` - Query vector, must match the corpus dimension
    /// * `k` - Number of neighbors requested, capped at the corpus size
    ///
    /// # Returns
    /// * `Result<SearchHits>` - At most `k` hits ordered by ascending distance, ties by row
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<SearchHits> {
        if query.len() != self.dimension() {
            return Err(NewsError::InvalidDimension {
                expected: self.dimension(),
                actual: query.len(),
            });
        }

        let k = k.min(self.len());
        if k == 0 {
            return Ok(SearchHits::default());
        }

        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .iter_rows()
            .enumerate()
            .map(|(row, vector)| (squared_l2(query, vector), row))
            .collect();

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, compare_hits);
            scored.truncate(k);
        }
        scored.sort_unstable_by(compare_hits);

        debug!(
            "Flat search over {} vectors returned {} hits",
            self.len(),
            scored.len()
        );

        let (distances, indices) = scored.into_iter().unzip();
        Ok(SearchHits { distances, indices })
    }
}

fn compare_hits(a: &(f32, usize), b: &(f32, usize)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

/// Squared Euclidean distance between equal-length vectors
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Load the cached embedding matrix, building and persisting it first when it is absent
///
/// # Arguments
/// * `dataset` - Resolved dataset layout
/// * `encoder` - Producer of corpus embeddings, only consulted when the cache is missing
///
/// # Returns
/// * `Result<VectorIndex>` - Index over the cached matrix, or `MissingEmbeddingCache`
#[inline]
pub fn build_or_load_index(
    dataset: &DatasetConfig,
    encoder: Option<&dyn CorpusEncoder>,
) -> Result<VectorIndex> {
    let cache_path = &dataset.embedding_cache_path;

    if cache_path.exists() {
        let vectors = EmbeddingMatrix::load(cache_path)?;
        info!(
            "Loaded {} embeddings of dimension {} from {}",
            vectors.rows(),
            vectors.dimension(),
            cache_path.display()
        );
        return Ok(VectorIndex::new(vectors));
    }

    let Some(encoder) = encoder else {
        return Err(NewsError::MissingEmbeddingCache(cache_path.clone()));
    };

    info!(
        "No embedding cache at {}, encoding corpus",
        cache_path.display()
    );
    let vectors = encode_corpus(dataset, encoder)?;
    vectors.save(cache_path)?;
    Ok(VectorIndex::new(vectors))
}
