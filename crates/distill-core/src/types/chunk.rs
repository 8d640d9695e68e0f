//! Chunk and pipeline result types.
//!
//! All entities here are request-scoped values: the pipeline clones chunks
//! before writing cluster assignments, so caller inputs are never mutated.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::filter::Filter;

/// A retrieved document fragment with its embedding and relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier in the retrieval backend.
    pub id: String,
    /// Original text content.
    pub text: String,
    /// Vector representation (f32 for memory efficiency; may be empty).
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// Relevance score from the retrieval collaborator (higher = more relevant).
    pub score: f32,
    /// Additional key-value pairs.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Cluster assigned during deduplication (-1 if not clustered).
    #[serde(default = "unassigned_cluster")]
    pub cluster_id: i32,
}

fn unassigned_cluster() -> i32 {
    -1
}

impl Chunk {
    /// Create a new chunk with empty metadata and no cluster assignment.
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        embedding: Vec<f32>,
        score: f32,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            embedding,
            score,
            metadata: HashMap::new(),
            cluster_id: unassigned_cluster(),
        }
    }

    /// Embedding dimensionality.
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

/// A query to the retrieval collaborator.
///
/// The optional `*_override` fields tune a single broker call without
/// touching the broker's configuration; the collaborator ignores them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalRequest {
    /// Text query (embedded by the broker when no embedding is supplied).
    #[serde(default)]
    pub query: String,
    /// Pre-computed query vector (optional if `query` is set).
    #[serde(default)]
    pub query_embedding: Vec<f32>,
    /// Number of results to retrieve.
    #[serde(default)]
    pub top_k: usize,
    /// Namespace or collection to search, routed to the collaborator opaquely.
    #[serde(default)]
    pub namespace: String,
    /// Metadata filter, routed to the collaborator unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// Request embeddings in the response. The broker forces this to true.
    #[serde(default)]
    pub include_embeddings: bool,
    /// Request metadata in the response.
    #[serde(default)]
    pub include_metadata: bool,

    /// Per-request override for the broker's over-fetch size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub over_fetch_k: Option<usize>,
    /// Per-request override for the number of chunks finally returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_k: Option<usize>,
    /// Per-request override for the clustering threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_threshold: Option<f64>,
    /// Per-request override for the MMR lambda.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mmr_lambda: Option<f64>,
}

impl RetrievalRequest {
    /// Whether any per-request tuning override is present.
    pub fn has_overrides(&self) -> bool {
        self.over_fetch_k.is_some()
            || self.target_k.is_some()
            || self.cluster_threshold.is_some()
            || self.mmr_lambda.is_some()
    }
}

/// Output of a retrieval collaborator query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Retrieved chunks.
    pub chunks: Vec<Chunk>,
    /// Embedding used for the query.
    #[serde(default)]
    pub query_embedding: Vec<f32>,
    /// Total number of matches (may exceed `chunks.len()`).
    pub total_matches: usize,
    /// Query execution time.
    #[serde(default)]
    pub latency: Duration,
}

/// A group of semantically similar chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    /// Cluster identifier, dense `0..cluster_count` within a result.
    pub id: usize,
    /// Member chunks, carrying this cluster's id.
    pub members: Vec<Chunk>,
    /// Arithmetic mean embedding of the members (empty if members had none).
    pub centroid: Vec<f32>,
    /// The chunk selected to represent this cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub representative: Option<Chunk>,
}

impl Cluster {
    /// Number of members in the cluster.
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Output of the clustering stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterResult {
    /// Identified groups, ids dense in `0..cluster_count`.
    pub clusters: Vec<Cluster>,
    /// Selected representatives, one per cluster (populated by the selector).
    pub representatives: Vec<Chunk>,
    /// Number of chunks before clustering.
    pub input_count: usize,
    /// Number of clusters formed.
    pub cluster_count: usize,
    /// Clustering execution time.
    #[serde(default)]
    pub latency: Duration,
}

impl ClusterResult {
    /// Percentage of chunks removed by deduplication.
    pub fn reduction_percent(&self) -> f64 {
        if self.input_count == 0 {
            return 0.0;
        }
        (self.input_count - self.representatives.len()) as f64 / self.input_count as f64 * 100.0
    }
}

/// Final output of the broker pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerResult {
    /// Deduplicated, diversity-ranked chunks.
    pub chunks: Vec<Chunk>,
    /// Processing statistics.
    pub stats: BrokerStats,
}

/// Per-stage broker metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerStats {
    /// Chunks fetched from the retrieval collaborator.
    pub retrieved: usize,
    /// Clusters formed.
    pub clustered: usize,
    /// Chunks in the final output.
    pub returned: usize,
    /// Time spent in the retrieval collaborator.
    #[serde(default)]
    pub retrieval_latency: Duration,
    /// Time spent clustering.
    #[serde(default)]
    pub clustering_latency: Duration,
    /// End-to-end processing time.
    #[serde(default)]
    pub total_latency: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_chunk_defaults() {
        let chunk = Chunk::new("c1", "hello", vec![1.0, 0.0], 0.9);
        assert_eq!(chunk.cluster_id, -1);
        assert_eq!(chunk.dimension(), 2);
        assert!(chunk.metadata.is_empty());
    }

    #[test]
    fn test_reduction_percent() {
        let result = ClusterResult {
            input_count: 10,
            representatives: vec![Chunk::new("a", "", vec![], 0.0); 4],
            ..Default::default()
        };
        assert!((result.reduction_percent() - 60.0).abs() < 1e-9);

        assert_eq!(ClusterResult::default().reduction_percent(), 0.0);
    }

    #[test]
    fn test_request_overrides_flag() {
        let mut req = RetrievalRequest::default();
        assert!(!req.has_overrides());
        req.target_k = Some(3);
        assert!(req.has_overrides());
    }

    #[test]
    fn test_chunk_roundtrips_through_json() {
        let mut chunk = Chunk::new("c1", "text", vec![0.5], 0.25);
        chunk
            .metadata
            .insert("source".to_string(), serde_json::json!("docs"));

        let encoded = serde_json::to_string(&chunk).unwrap();
        let decoded: Chunk = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.id, "c1");
        assert_eq!(decoded.metadata["source"], serde_json::json!("docs"));
    }
}
