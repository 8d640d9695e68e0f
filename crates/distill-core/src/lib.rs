//! distill-core - Core library for distill.
//!
//! This crate provides the data model, collaborator traits and the
//! deduplication pipeline: a broker that over-fetches retrieval candidates,
//! collapses near-duplicates with agglomerative clustering, keeps one
//! representative per cluster and re-ranks the survivors with Maximal
//! Marginal Relevance. The transformation is pure numerical computation, so
//! outputs are reproducible for a fixed input.
//!
//! # Example
//!
//! ```ignore
//! use distill_core::{Broker, BrokerConfig, CancellationToken};
//!
//! let broker = Broker::new(retriever, BrokerConfig::default())
//!     .with_embedder(embedder);
//!
//! let result = broker
//!     .retrieve_by_text("how do lifetimes work", "docs", &CancellationToken::new())
//!     .await?;
//! println!("kept {} of {} chunks", result.stats.returned, result.stats.retrieved);
//! ```

pub mod error;
pub mod numeric;
pub mod pipeline;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{DistillError, DistillResult, ErrorCode, PipelineStage};
pub use pipeline::{
    cluster_by_threshold, coverage_score, diversity_score, mmr_rerank, select_top_k, Broker,
    BrokerConfig, ClusterConfig, Clusterer, Linkage, MmrConfig, MmrReranker, SelectionStrategy,
    Selector, SelectorConfig,
};
pub use traits::{
    Embedder, EmbedderConfig, EmbedderProvider, Retriever, RetrieverConfig, RetrieverProvider,
};
pub use types::{
    from_simple_filters, BrokerResult, BrokerStats, Chunk, Cluster, ClusterResult, Filter,
    FilterCondition, FilterOperator, RetrievalRequest, RetrievalResult,
};

/// Cancellation primitive threaded through broker and collaborator calls.
pub use tokio_util::sync::CancellationToken;
