// Embeddings module
// Producers of article embeddings consumed by the vector index

pub mod ollama;

pub use ollama::OllamaClient;

use crate::Result;

/// Turns article text into fixed-dimension vectors
pub trait CorpusEncoder {
    /// Encode `texts` in order, returning exactly one vector per input
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Encode a single passage
    #[inline]
    fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        self.encode(&[text.to_string()])?
            .pop()
            .ok_or_else(|| crate::NewsError::Embedding("encoder returned no vector".to_string()))
    }
}
