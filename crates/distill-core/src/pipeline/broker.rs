//! Broker orchestrating the deduplication pipeline.
//!
//! Chains query embedding, over-fetch, clustering, representative selection
//! and MMR re-ranking. Collaborator failures surface verbatim; the broker
//! never retries. The cancellation token is checked after every collaborator
//! call and before every stage.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{DistillError, DistillResult, PipelineStage};
use crate::traits::{Embedder, Retriever};
use crate::types::{BrokerResult, BrokerStats, Chunk, RetrievalRequest};

use super::cluster::{ClusterConfig, Clusterer, Linkage};
use super::mmr::{MmrConfig, MmrReranker};
use super::selector::{SelectionStrategy, Selector, SelectorConfig};

/// Configuration for the broker pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Number of chunks to over-fetch from the retrieval collaborator.
    /// Recommended 3-5x `target_k`.
    pub over_fetch_k: usize,
    /// Final number of chunks to return.
    pub target_k: usize,
    /// Cosine distance threshold for clustering, in (0, 2].
    pub cluster_threshold: f64,
    /// Linkage used for inter-cluster distance.
    #[serde(default)]
    pub cluster_linkage: Linkage,
    /// How representatives are picked from clusters.
    #[serde(default)]
    pub selection_strategy: SelectionStrategy,
    /// Enable MMR re-ranking of the representatives.
    pub enable_mmr: bool,
    /// MMR relevance vs diversity trade-off in [0, 1].
    pub mmr_lambda: f64,
    /// Request metadata in retrieval results.
    pub include_metadata: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            over_fetch_k: 50,
            target_k: 8,
            cluster_threshold: 0.15,
            cluster_linkage: Linkage::Average,
            selection_strategy: SelectionStrategy::Score,
            enable_mmr: true,
            mmr_lambda: 0.5,
            include_metadata: true,
        }
    }
}

impl BrokerConfig {
    /// Apply defaults to out-of-range values.
    fn normalized(mut self) -> Self {
        if self.over_fetch_k == 0 {
            self.over_fetch_k = 50;
        }
        if self.target_k == 0 {
            self.target_k = 8;
        }
        if !(self.cluster_threshold > 0.0 && self.cluster_threshold <= 2.0) {
            self.cluster_threshold = 0.15;
        }
        self.mmr_lambda = self.mmr_lambda.clamp(0.0, 1.0);
        self
    }

    /// Merge a request's per-call overrides into a copy of this config.
    fn with_overrides(&self, req: &RetrievalRequest) -> Self {
        let mut cfg = self.clone();
        if let Some(k) = req.over_fetch_k {
            cfg.over_fetch_k = k;
        }
        if let Some(k) = req.target_k {
            cfg.target_k = k;
        }
        if let Some(threshold) = req.cluster_threshold {
            cfg.cluster_threshold = threshold;
        }
        if let Some(lambda) = req.mmr_lambda {
            cfg.mmr_lambda = lambda;
        }
        cfg.normalized()
    }
}

/// The config snapshot plus the stage components built from it.
///
/// Swapped wholesale by `set_config`; a retrieve in flight keeps the clone
/// it took at entry, so configuration changes never tear a request.
#[derive(Clone)]
struct Pipeline {
    cfg: BrokerConfig,
    clusterer: Clusterer,
    selector: Selector,
    mmr: Option<MmrReranker>,
}

impl Pipeline {
    fn new(cfg: BrokerConfig) -> Self {
        let cfg = cfg.normalized();

        let clusterer = Clusterer::new(ClusterConfig {
            threshold: cfg.cluster_threshold,
            linkage: cfg.cluster_linkage,
            ..Default::default()
        });
        let selector = Selector::new(SelectorConfig::with_strategy(cfg.selection_strategy));
        let mmr = cfg.enable_mmr.then(|| {
            MmrReranker::new(MmrConfig {
                lambda: cfg.mmr_lambda,
                target_k: cfg.target_k,
            })
        });

        Self {
            cfg,
            clusterer,
            selector,
            mmr,
        }
    }
}

/// Orchestrates the semantic deduplication pipeline.
///
/// Holds the retrieval and embedding collaborators as opaque capabilities;
/// the only shared mutable state is the pipeline configuration.
pub struct Broker {
    retriever: Arc<dyn Retriever>,
    embedder: Option<Arc<dyn Embedder>>,
    pipeline: RwLock<Pipeline>,
}

impl Broker {
    /// Create a broker over a retrieval collaborator.
    pub fn new(retriever: Arc<dyn Retriever>, cfg: BrokerConfig) -> Self {
        Self {
            retriever,
            embedder: None,
            pipeline: RwLock::new(Pipeline::new(cfg)),
        }
    }

    /// Wire an embedding collaborator, enabling text queries.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Run the full pipeline for a request.
    pub async fn retrieve(
        &self,
        req: &RetrievalRequest,
        cancel: &CancellationToken,
    ) -> DistillResult<BrokerResult> {
        let total_start = Instant::now();
        let pipeline = self.snapshot(req);
        let mut stats = BrokerStats::default();

        if cancel.is_cancelled() {
            return Err(DistillError::cancelled(PipelineStage::Embedding));
        }

        // Stage 1: embed the query when only text was supplied.
        let mut query_embedding = req.query_embedding.clone();
        if query_embedding.is_empty() && !req.query.is_empty() {
            let embedder = self.embedder.as_ref().ok_or_else(|| {
                DistillError::Configuration(
                    "an embedding provider is required for text queries".to_string(),
                )
            })?;
            query_embedding = embedder.embed(&req.query, cancel).await?;
            if cancel.is_cancelled() {
                return Err(DistillError::cancelled(PipelineStage::Retrieval));
            }
        }
        if query_embedding.is_empty() {
            return Err(DistillError::invalid_query());
        }

        // Stage 2: over-fetch candidates. The caller's request is cloned,
        // never mutated; embeddings are forced on since clustering needs them.
        let mut fetch_req = req.clone();
        fetch_req.query_embedding = query_embedding;
        fetch_req.top_k = pipeline.cfg.over_fetch_k;
        fetch_req.include_embeddings = true;
        fetch_req.include_metadata = pipeline.cfg.include_metadata;

        let retrieval_start = Instant::now();
        let retrieved = self.retriever.query(&fetch_req, cancel).await?;
        stats.retrieval_latency = retrieval_start.elapsed();
        stats.retrieved = retrieved.chunks.len();
        debug!(
            retrieved = stats.retrieved,
            over_fetch_k = pipeline.cfg.over_fetch_k,
            "retrieval stage complete"
        );

        if cancel.is_cancelled() {
            return Err(DistillError::cancelled(PipelineStage::Clustering));
        }
        if retrieved.chunks.is_empty() {
            stats.total_latency = total_start.elapsed();
            return Ok(BrokerResult {
                chunks: Vec::new(),
                stats,
            });
        }

        // Stages 3-5: cluster, select, re-rank.
        let result = self.dedup(&pipeline, &retrieved.chunks, &mut stats, Some(cancel))?;
        stats.total_latency = total_start.elapsed();

        Ok(BrokerResult {
            chunks: result,
            stats,
        })
    }

    /// Convenience wrapper for text queries.
    pub async fn retrieve_by_text(
        &self,
        query: &str,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> DistillResult<BrokerResult> {
        let req = RetrievalRequest {
            query: query.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        };
        self.retrieve(&req, cancel).await
    }

    /// Convenience wrapper for vector queries.
    pub async fn retrieve_by_vector(
        &self,
        embedding: Vec<f32>,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> DistillResult<BrokerResult> {
        let req = RetrievalRequest {
            query_embedding: embedding,
            namespace: namespace.to_string(),
            ..Default::default()
        };
        self.retrieve(&req, cancel).await
    }

    /// Apply deduplication to pre-fetched chunks, skipping the embedding and
    /// retrieval stages. Purely CPU-bound, so it cannot fail or block.
    pub fn process_chunks(&self, chunks: &[Chunk]) -> BrokerResult {
        let total_start = Instant::now();
        let pipeline = self
            .pipeline
            .read()
            .expect("pipeline lock poisoned")
            .clone();

        let mut stats = BrokerStats {
            retrieved: chunks.len(),
            ..Default::default()
        };

        if chunks.is_empty() {
            stats.total_latency = total_start.elapsed();
            return BrokerResult {
                chunks: Vec::new(),
                stats,
            };
        }

        let result = self
            .dedup(&pipeline, chunks, &mut stats, None)
            .unwrap_or_default();
        stats.total_latency = total_start.elapsed();

        BrokerResult {
            chunks: result,
            stats,
        }
    }

    /// Cluster, select and re-rank a candidate set.
    fn dedup(
        &self,
        pipeline: &Pipeline,
        chunks: &[Chunk],
        stats: &mut BrokerStats,
        cancel: Option<&CancellationToken>,
    ) -> DistillResult<Vec<Chunk>> {
        let clustering_start = Instant::now();
        let mut cluster_result = pipeline.clusterer.cluster(chunks);
        stats.clustering_latency = clustering_start.elapsed();
        stats.clustered = cluster_result.cluster_count;
        debug!(
            input = cluster_result.input_count,
            clusters = cluster_result.cluster_count,
            "clustering stage complete"
        );

        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(DistillError::cancelled(PipelineStage::Selection));
        }

        let representatives = pipeline.selector.select(&mut cluster_result);

        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(DistillError::cancelled(PipelineStage::Rerank));
        }

        let final_chunks = if representatives.len() > pipeline.cfg.target_k {
            match &pipeline.mmr {
                Some(mmr) => mmr.rerank(&representatives),
                None => {
                    // Top target_k by score; the stable sort preserves
                    // cluster order on ties.
                    let mut reps = representatives;
                    reps.sort_by(|a, b| OrderedFloat(b.score).cmp(&OrderedFloat(a.score)));
                    reps.truncate(pipeline.cfg.target_k);
                    reps
                }
            }
        } else {
            representatives
        };

        stats.returned = final_chunks.len();
        Ok(final_chunks)
    }

    /// Take the pipeline for this request: the shared snapshot, or a local
    /// rebuild when the request carries per-call overrides.
    fn snapshot(&self, req: &RetrievalRequest) -> Pipeline {
        let shared = self.pipeline.read().expect("pipeline lock poisoned");
        if req.has_overrides() {
            Pipeline::new(shared.cfg.with_overrides(req))
        } else {
            shared.clone()
        }
    }

    /// Atomically replace the configuration and rebuild the stage components.
    ///
    /// Takes effect for the next `retrieve`; calls already in flight finish
    /// with the configuration they started with.
    pub fn set_config(&self, cfg: BrokerConfig) {
        let pipeline = Pipeline::new(cfg);
        debug!(
            over_fetch_k = pipeline.cfg.over_fetch_k,
            target_k = pipeline.cfg.target_k,
            "broker configuration replaced"
        );
        *self.pipeline.write().expect("pipeline lock poisoned") = pipeline;
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> BrokerConfig {
        self.pipeline
            .read()
            .expect("pipeline lock poisoned")
            .cfg
            .clone()
    }

    /// Release collaborator resources.
    pub async fn close(&self) -> DistillResult<()> {
        self.retriever.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    use crate::error::ErrorCode;
    use crate::types::RetrievalResult;

    struct MockRetriever {
        chunks: Vec<Chunk>,
    }

    #[async_trait]
    impl Retriever for MockRetriever {
        async fn query(
            &self,
            req: &RetrievalRequest,
            _cancel: &CancellationToken,
        ) -> DistillResult<RetrievalResult> {
            assert!(req.include_embeddings, "broker must force embeddings on");
            Ok(RetrievalResult {
                chunks: self.chunks.iter().take(req.top_k).cloned().collect(),
                query_embedding: req.query_embedding.clone(),
                total_matches: self.chunks.len(),
                latency: Duration::ZERO,
            })
        }

        async fn query_by_id(
            &self,
            id: &str,
            _top_k: usize,
            _namespace: &str,
            _cancel: &CancellationToken,
        ) -> DistillResult<RetrievalResult> {
            Err(DistillError::not_found(id))
        }
    }

    struct MockEmbedder;

    #[async_trait]
    impl Embedder for MockEmbedder {
        async fn embed(&self, text: &str, _cancel: &CancellationToken) -> DistillResult<Vec<f32>> {
            if text.is_empty() {
                return Err(DistillError::embedding_with_code(
                    "empty input",
                    ErrorCode::EmbEmptyInput,
                ));
            }
            Ok(vec![1.0, 0.0, 0.0])
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    fn chunk(id: &str, embedding: Vec<f32>, score: f32) -> Chunk {
        Chunk::new(id, format!("text {id}"), embedding, score)
    }

    fn candidates() -> Vec<Chunk> {
        vec![
            chunk("a", vec![1.0, 0.0, 0.0], 0.9),
            chunk("b", vec![0.999, 0.001, 0.0], 0.8),
            chunk("c", vec![0.0, 0.0, 1.0], 0.7),
        ]
    }

    fn broker_with(chunks: Vec<Chunk>, cfg: BrokerConfig) -> Broker {
        Broker::new(Arc::new(MockRetriever { chunks }), cfg)
    }

    #[tokio::test]
    async fn test_vector_query_deduplicates() {
        let broker = broker_with(candidates(), BrokerConfig::default());
        let cancel = CancellationToken::new();

        let result = broker
            .retrieve_by_vector(vec![1.0, 0.0, 0.0], "", &cancel)
            .await
            .unwrap();

        assert_eq!(result.stats.retrieved, 3);
        assert_eq!(result.stats.clustered, 2);
        assert_eq!(result.stats.returned, 2);
        let ids: Vec<&str> = result.chunks.iter().map(|c| c.id.as_str()).collect();
        // The higher-scored near-duplicate survives.
        assert!(ids.contains(&"a"));
        assert!(!ids.contains(&"b"));
        assert!(ids.contains(&"c"));
    }

    #[tokio::test]
    async fn test_text_query_without_embedder_is_configuration_error() {
        let broker = broker_with(candidates(), BrokerConfig::default());
        let err = broker
            .retrieve_by_text("what is rust", "", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DistillError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_text_query_with_embedder() {
        let broker =
            broker_with(candidates(), BrokerConfig::default()).with_embedder(Arc::new(MockEmbedder));
        let result = broker
            .retrieve_by_text("what is rust", "", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.stats.retrieved, 3);
    }

    #[tokio::test]
    async fn test_empty_query_is_invalid() {
        let broker = broker_with(candidates(), BrokerConfig::default());
        let err = broker
            .retrieve(&RetrievalRequest::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValMissingQuery);
    }

    #[tokio::test]
    async fn test_zero_candidates_is_empty_success() {
        let broker = broker_with(Vec::new(), BrokerConfig::default());
        let result = broker
            .retrieve_by_vector(vec![1.0, 0.0, 0.0], "", &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.chunks.is_empty());
        assert_eq!(result.stats.retrieved, 0);
        assert_eq!(result.stats.returned, 0);
    }

    #[tokio::test]
    async fn test_top_k_trim_without_mmr() {
        let chunks = vec![
            chunk("a", vec![1.0, 0.0, 0.0], 0.1),
            chunk("b", vec![0.0, 1.0, 0.0], 0.9),
            chunk("c", vec![0.0, 0.0, 1.0], 0.5),
        ];
        let cfg = BrokerConfig {
            target_k: 2,
            enable_mmr: false,
            ..Default::default()
        };
        let broker = broker_with(chunks, cfg);

        let result = broker
            .retrieve_by_vector(vec![1.0, 0.0, 0.0], "", &CancellationToken::new())
            .await
            .unwrap();
        let ids: Vec<&str> = result.chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_per_request_overrides() {
        let chunks = vec![
            chunk("a", vec![1.0, 0.0, 0.0], 0.9),
            chunk("b", vec![0.0, 1.0, 0.0], 0.8),
            chunk("c", vec![0.0, 0.0, 1.0], 0.7),
        ];
        let broker = broker_with(chunks, BrokerConfig::default());

        let req = RetrievalRequest {
            query_embedding: vec![1.0, 0.0, 0.0],
            target_k: Some(1),
            ..Default::default()
        };
        let result = broker
            .retrieve(&req, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.chunks.len(), 1);

        // The shared configuration is untouched.
        assert_eq!(broker.config().target_k, 8);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_aborts() {
        let broker = broker_with(candidates(), BrokerConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = broker
            .retrieve_by_vector(vec![1.0, 0.0, 0.0], "", &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_process_chunks_shortcut() {
        let broker = broker_with(Vec::new(), BrokerConfig::default());
        let result = broker.process_chunks(&candidates());

        assert_eq!(result.stats.retrieved, 3);
        assert_eq!(result.stats.clustered, 2);
        assert_eq!(result.stats.returned, 2);

        let empty = broker.process_chunks(&[]);
        assert!(empty.chunks.is_empty());
        assert_eq!(empty.stats.retrieved, 0);
    }

    #[test]
    fn test_set_config_rebuilds_pipeline() {
        let broker = broker_with(Vec::new(), BrokerConfig::default());
        assert_eq!(broker.config().target_k, 8);

        broker.set_config(BrokerConfig {
            target_k: 3,
            enable_mmr: false,
            ..Default::default()
        });
        assert_eq!(broker.config().target_k, 3);
        assert!(!broker.config().enable_mmr);
    }

    #[test]
    fn test_config_normalization() {
        let broker = broker_with(
            Vec::new(),
            BrokerConfig {
                over_fetch_k: 0,
                target_k: 0,
                cluster_threshold: -0.5,
                mmr_lambda: 3.0,
                ..Default::default()
            },
        );
        let cfg = broker.config();
        assert_eq!(cfg.over_fetch_k, 50);
        assert_eq!(cfg.target_k, 8);
        assert!((cfg.cluster_threshold - 0.15).abs() < 1e-9);
        assert!((cfg.mmr_lambda - 1.0).abs() < 1e-9);
    }
}
