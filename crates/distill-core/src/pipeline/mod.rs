//! Retrieval-deduplication pipeline.
//!
//! This module provides:
//! - Agglomerative clustering with single/complete/average linkage
//! - Representative selection with four strategies
//! - Maximal Marginal Relevance re-ranking
//! - The broker orchestrating over-fetch, clustering, selection and MMR

mod broker;
mod cluster;
mod mmr;
mod selector;

pub use broker::{Broker, BrokerConfig};
pub use cluster::{
    cluster_by_threshold, sort_clusters_by_max_score, sort_clusters_by_size, ClusterConfig,
    Clusterer, Linkage,
};
pub use mmr::{coverage_score, diversity_score, mmr_rerank, MmrConfig, MmrReranker};
pub use selector::{select_top_k, SelectionStrategy, Selector, SelectorConfig};
