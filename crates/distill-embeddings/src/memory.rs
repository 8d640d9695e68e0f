//! Deterministic in-memory embedding provider.
//!
//! Derives a unit vector from SHA-256 digests of the input text. The mapping
//! has no semantic content, but it is stable across processes and gives
//! distinct texts distinct directions, which is what pipeline tests need.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use distill_core::error::{DistillError, DistillResult, ErrorCode};
use distill_core::numeric;
use distill_core::traits::Embedder;

const MODEL_NAME: &str = "in-memory-hash";

/// Hash-seeded embedding provider.
pub struct InMemoryEmbedder {
    dimension: usize,
}

impl InMemoryEmbedder {
    /// Create an embedder producing vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: if dimension == 0 { 384 } else { dimension },
        }
    }
}

impl Default for InMemoryEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for InMemoryEmbedder {
    async fn embed(&self, text: &str, _cancel: &CancellationToken) -> DistillResult<Vec<f32>> {
        if text.is_empty() {
            return Err(DistillError::embedding_with_code(
                "cannot embed empty input",
                ErrorCode::EmbEmptyInput,
            ));
        }

        let mut embedding = Vec::with_capacity(self.dimension);
        let mut block = 0u64;
        while embedding.len() < self.dimension {
            // Each counter block hashes to 32 bytes, read as eight values.
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(block.to_le_bytes());
            let digest = hasher.finalize();

            for word in digest.chunks_exact(4) {
                if embedding.len() == self.dimension {
                    break;
                }
                let raw = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
                // Map to [-1, 1].
                let value = (f64::from(raw) / f64::from(u32::MAX)) * 2.0 - 1.0;
                embedding.push(value as f32);
            }
            block += 1;
        }

        numeric::normalize_in_place(&mut embedding);
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distill_core::numeric::dot_product;

    #[tokio::test]
    async fn test_embeddings_are_deterministic() {
        let embedder = InMemoryEmbedder::new(64);
        let cancel = CancellationToken::new();

        let first = embedder.embed("hello world", &cancel).await.unwrap();
        let second = embedder.embed("hello world", &cancel).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[tokio::test]
    async fn test_distinct_texts_get_distinct_vectors() {
        let embedder = InMemoryEmbedder::new(64);
        let cancel = CancellationToken::new();

        let a = embedder.embed("alpha", &cancel).await.unwrap();
        let b = embedder.embed("beta", &cancel).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_embeddings_are_unit_length() {
        let embedder = InMemoryEmbedder::new(128);
        let v = embedder
            .embed("normalize me", &CancellationToken::new())
            .await
            .unwrap();
        assert!((dot_product(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let embedder = InMemoryEmbedder::default();
        let err = embedder
            .embed("", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::EmbEmptyInput);
    }

    #[tokio::test]
    async fn test_batch_uses_default_implementation() {
        let embedder = InMemoryEmbedder::new(32);
        let texts = vec!["one".to_string(), "two".to_string()];
        let embeddings = embedder
            .embed_batch(&texts, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_ne!(embeddings[0], embeddings[1]);
    }

    #[test]
    fn test_zero_dimension_defaults() {
        assert_eq!(InMemoryEmbedder::new(0).dimension(), 384);
    }
}
