//! In-memory retrieval backend.
//!
//! Holds chunks per namespace and answers queries by brute-force cosine
//! similarity. Supports the full retrieval contract including metadata
//! filters, so it stands in for a vector database in tests and demos.

use std::collections::HashMap;

use async_trait::async_trait;
use ordered_float::OrderedFloat;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use distill_core::error::{DistillError, DistillResult, ErrorCode, PipelineStage};
use distill_core::numeric;
use distill_core::traits::{Retriever, RetrieverConfig};
use distill_core::types::{Chunk, RetrievalRequest, RetrievalResult};

/// Brute-force in-memory retriever.
pub struct InMemoryRetriever {
    cfg: RetrieverConfig,
    namespaces: RwLock<HashMap<String, Vec<Chunk>>>,
}

impl InMemoryRetriever {
    /// Create an empty retriever with the given configuration.
    pub fn new(cfg: RetrieverConfig) -> Self {
        Self {
            cfg,
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    /// Create an empty retriever with default configuration.
    pub fn default_config() -> Self {
        Self::new(RetrieverConfig::default())
    }

    /// Insert or replace chunks by id within a namespace.
    pub async fn upsert(&self, namespace: &str, chunks: Vec<Chunk>) {
        let namespace = self.resolve_namespace(namespace);
        let mut namespaces = self.namespaces.write().await;
        let stored = namespaces.entry(namespace).or_default();

        for chunk in chunks {
            match stored.iter_mut().find(|c| c.id == chunk.id) {
                Some(existing) => *existing = chunk,
                None => stored.push(chunk),
            }
        }
    }

    /// Delete a chunk by id. Returns whether anything was removed.
    pub async fn delete(&self, namespace: &str, id: &str) -> bool {
        let namespace = self.resolve_namespace(namespace);
        let mut namespaces = self.namespaces.write().await;
        match namespaces.get_mut(&namespace) {
            Some(stored) => {
                let before = stored.len();
                stored.retain(|c| c.id != id);
                stored.len() < before
            }
            None => false,
        }
    }

    /// Number of chunks held in a namespace.
    pub async fn count(&self, namespace: &str) -> usize {
        let namespace = self.resolve_namespace(namespace);
        self.namespaces
            .read()
            .await
            .get(&namespace)
            .map_or(0, Vec::len)
    }

    fn resolve_namespace(&self, namespace: &str) -> String {
        if namespace.is_empty() {
            self.cfg.default_namespace.clone()
        } else {
            namespace.to_string()
        }
    }
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    async fn query(
        &self,
        req: &RetrievalRequest,
        cancel: &CancellationToken,
    ) -> DistillResult<RetrievalResult> {
        let start = std::time::Instant::now();

        if cancel.is_cancelled() {
            return Err(DistillError::cancelled(PipelineStage::Retrieval));
        }
        if req.query_embedding.is_empty() {
            return Err(DistillError::retrieval_with_code(
                "query embedding is required",
                ErrorCode::RetInvalidQuery,
            ));
        }

        let namespace = self.resolve_namespace(&req.namespace);
        let namespaces = self.namespaces.read().await;
        let stored = namespaces.get(&namespace).map_or(&[][..], Vec::as_slice);

        let mut matches: Vec<Chunk> = stored
            .iter()
            .filter(|chunk| {
                req.filter
                    .as_ref()
                    .map_or(true, |f| f.matches(&chunk.metadata))
            })
            .map(|chunk| {
                let mut scored = chunk.clone();
                scored.score =
                    numeric::cosine_similarity(&req.query_embedding, &chunk.embedding) as f32;
                scored
            })
            .collect();
        let total_matches = matches.len();

        // Stable sort keeps insertion order on equal scores.
        matches.sort_by(|a, b| OrderedFloat(b.score).cmp(&OrderedFloat(a.score)));
        matches.truncate(req.top_k);

        for chunk in &mut matches {
            if !req.include_embeddings {
                chunk.embedding.clear();
            }
            if !req.include_metadata {
                chunk.metadata.clear();
            }
        }

        Ok(RetrievalResult {
            chunks: matches,
            query_embedding: req.query_embedding.clone(),
            total_matches,
            latency: start.elapsed(),
        })
    }

    async fn query_by_id(
        &self,
        id: &str,
        top_k: usize,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> DistillResult<RetrievalResult> {
        let embedding = {
            let resolved = self.resolve_namespace(namespace);
            let namespaces = self.namespaces.read().await;
            namespaces
                .get(&resolved)
                .and_then(|stored| stored.iter().find(|c| c.id == id))
                .map(|c| c.embedding.clone())
                .ok_or_else(|| DistillError::not_found(id))?
        };

        // Fetch one extra so the seed itself can be dropped from the result.
        let req = RetrievalRequest {
            query_embedding: embedding,
            top_k: top_k + 1,
            namespace: namespace.to_string(),
            include_embeddings: true,
            include_metadata: true,
            ..Default::default()
        };
        let mut result = self.query(&req, cancel).await?;
        result.chunks.retain(|c| c.id != id);
        result.chunks.truncate(top_k);
        result.total_matches = result.total_matches.saturating_sub(1);
        Ok(result)
    }
}
