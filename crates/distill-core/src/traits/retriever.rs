//! Retriever trait and related types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::DistillResult;
use crate::types::{RetrievalRequest, RetrievalResult};

/// Core Retriever trait - all retrieval backends implement this.
///
/// Implementations report failures with the retrieval error vocabulary
/// (invalid query, not found, connection failed, rate limited, timeout) and
/// honor the caller's cancellation token.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve chunks similar to the request's query embedding.
    async fn query(
        &self,
        req: &RetrievalRequest,
        cancel: &CancellationToken,
    ) -> DistillResult<RetrievalResult>;

    /// Retrieve chunks similar to an existing vector by its id.
    async fn query_by_id(
        &self,
        id: &str,
        top_k: usize,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> DistillResult<RetrievalResult>;

    /// Release any resources held by the retriever.
    async fn close(&self) -> DistillResult<()> {
        Ok(())
    }
}

/// Retriever configuration shared by all backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverConfig {
    /// API key for authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Backend endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Timeout for operations in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Max retries for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Namespace used when requests do not specify one.
    #[serde(default)]
    pub default_namespace: String,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            host: None,
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            default_namespace: String::new(),
        }
    }
}

/// Retriever provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetrieverProvider {
    Pinecone,
    Qdrant,
    #[default]
    InMemory,
}
