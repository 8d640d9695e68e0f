//! Factory for creating embedding providers.

use std::sync::Arc;

use distill_core::error::{DistillError, DistillResult};
use distill_core::traits::{Embedder, EmbedderConfig, EmbedderProvider};

use crate::cached::CachedEmbedder;
use crate::memory::InMemoryEmbedder;

/// Factory for creating embedding providers.
pub struct EmbedderFactory;

impl EmbedderFactory {
    /// Create an embedder from the given configuration.
    pub fn create(
        provider: EmbedderProvider,
        config: EmbedderConfig,
    ) -> DistillResult<Arc<dyn Embedder>> {
        match provider {
            EmbedderProvider::InMemory => Ok(Arc::new(InMemoryEmbedder::new(config.embedding_dims))),
            _ => Err(DistillError::UnsupportedProvider {
                provider: format!("{provider:?}"),
            }),
        }
    }

    /// Create an in-memory embedder with the default dimension.
    pub fn in_memory() -> Arc<dyn Embedder> {
        Arc::new(InMemoryEmbedder::default())
    }

    /// Create an in-memory embedder with a specific dimension.
    pub fn in_memory_with_dims(dims: usize) -> Arc<dyn Embedder> {
        Arc::new(InMemoryEmbedder::new(dims))
    }

    /// Wrap an embedder with a cache.
    pub fn cached(inner: Arc<dyn Embedder>) -> Arc<CachedEmbedder> {
        Arc::new(CachedEmbedder::new(inner))
    }
}
