//! Caching wrapper around an embedding provider.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use distill_core::error::DistillResult;
use distill_core::traits::Embedder;

/// Wraps any embedder with a text-to-vector cache.
///
/// Repeated queries for the same text skip the inner provider entirely. The
/// cache key is the exact input text; the lock is never held across the
/// inner provider call.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Mutex<HashMap<String, Vec<f32>>>,
}

impl CachedEmbedder {
    /// Wrap an embedder with an empty cache.
    pub fn new(inner: Arc<dyn Embedder>) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached entries.
    pub fn cached_count(&self) -> usize {
        self.cache.lock().expect("cache lock poisoned").len()
    }

    /// Drop all cached entries.
    pub fn clear(&self) {
        self.cache.lock().expect("cache lock poisoned").clear();
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str, cancel: &CancellationToken) -> DistillResult<Vec<f32>> {
        if let Some(hit) = self.cache.lock().expect("cache lock poisoned").get(text) {
            return Ok(hit.clone());
        }

        let embedding = self.inner.embed(text, cancel).await?;
        self.cache
            .lock()
            .expect("cache lock poisoned")
            .insert(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
