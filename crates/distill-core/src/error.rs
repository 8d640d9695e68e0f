//! Error types for distill operations.
//!
//! This module provides the error hierarchy for the deduplication pipeline
//! with structured error codes and constructor helpers. Upstream collaborator
//! failures are surfaced verbatim; the pipeline itself never retries.

use thiserror::Error;

/// Result type alias for distill operations.
pub type DistillResult<T> = Result<T, DistillError>;

/// Pipeline stage, used to attribute cancellations and timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Query embedding via the embedding collaborator.
    Embedding,
    /// Over-fetch from the retrieval collaborator.
    Retrieval,
    /// Agglomerative clustering.
    Clustering,
    /// Representative selection.
    Selection,
    /// MMR re-ranking.
    Rerank,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Embedding => "embedding",
            PipelineStage::Retrieval => "retrieval",
            PipelineStage::Clustering => "clustering",
            PipelineStage::Selection => "selection",
            PipelineStage::Rerank => "rerank",
        };
        f.write_str(name)
    }
}

/// Main error type for all distill operations.
#[derive(Error, Debug)]
pub enum DistillError {
    /// Request validation failed.
    #[error("Validation error: {message}")]
    Validation { message: String, code: ErrorCode },

    /// Broker wiring is incomplete for the requested operation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Retrieval collaborator failed.
    #[error("Retrieval error: {message}")]
    Retrieval {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Embedding collaborator failed.
    #[error("Embedding error: {message}")]
    Embedding {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Rate limit reported by a collaborator.
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        code: ErrorCode,
        retry_after: Option<u64>,
    },

    /// The caller's context was cancelled between pipeline stages.
    #[error("Cancelled before {stage} stage")]
    Cancelled { stage: PipelineStage },

    /// Provider not supported.
    #[error("Provider not supported: {provider}")]
    UnsupportedProvider { provider: String },

    /// Internal invariant violated.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingQuery,

    // Retrieval (RET_xxx)
    RetInvalidQuery,
    RetNotFound,
    RetConnectionFailed,
    RetRateLimited,
    RetTimeout,

    // Embedding (EMB_xxx)
    EmbEmptyInput,
    EmbRateLimited,
    EmbInvalidCredentials,
    EmbModelNotFound,
    EmbContextTooLong,

    // Rate limit (RATE_xxx)
    RateLimitExceeded,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingQuery => "VAL_002",
            ErrorCode::RetInvalidQuery => "RET_001",
            ErrorCode::RetNotFound => "RET_002",
            ErrorCode::RetConnectionFailed => "RET_003",
            ErrorCode::RetRateLimited => "RET_004",
            ErrorCode::RetTimeout => "RET_005",
            ErrorCode::EmbEmptyInput => "EMB_001",
            ErrorCode::EmbRateLimited => "EMB_002",
            ErrorCode::EmbInvalidCredentials => "EMB_003",
            ErrorCode::EmbModelNotFound => "EMB_004",
            ErrorCode::EmbContextTooLong => "EMB_005",
            ErrorCode::RateLimitExceeded => "RATE_001",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl DistillError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
        }
    }

    /// Create the error for a request carrying neither query text nor embedding.
    pub fn invalid_query() -> Self {
        Self::Validation {
            message: "invalid query: must provide query text or embedding".to_string(),
            code: ErrorCode::ValMissingQuery,
        }
    }

    /// Create a retrieval error.
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval {
            message: message.into(),
            code: ErrorCode::RetConnectionFailed,
            source: None,
        }
    }

    /// Create a retrieval error with a specific code.
    pub fn retrieval_with_code(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::Retrieval {
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Create a not-found retrieval error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::Retrieval {
            message: format!("vector with id '{}' not found", id.into()),
            code: ErrorCode::RetNotFound,
            source: None,
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
            code: ErrorCode::EmbEmptyInput,
            source: None,
        }
    }

    /// Create an embedding error with a specific code.
    pub fn embedding_with_code(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::Embedding {
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Create a rate limit error.
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            message: message.into(),
            code: ErrorCode::RateLimitExceeded,
            retry_after: None,
        }
    }

    /// Create a cancellation error for the given stage.
    pub fn cancelled(stage: PipelineStage) -> Self {
        Self::Cancelled { stage }
    }

    /// Create an internal invariant error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::Retrieval { code, .. } => *code,
            Self::Embedding { code, .. } => *code,
            Self::RateLimit { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether the error was caused by context cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Validation { .. } => Some("Provide either query text or a query embedding"),
            Self::Configuration(_) => {
                Some("Wire an embedding provider to the broker for text queries")
            }
            Self::Retrieval { .. } => Some("Check your retrieval collaborator connection settings"),
            Self::Embedding { .. } => Some("Check your embedding provider configuration"),
            Self::RateLimit { .. } => Some("Wait before making more requests"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = DistillError::validation("bad input");
        assert_eq!(err.code(), ErrorCode::ValInvalidInput);
        assert!(err.to_string().contains("bad input"));
    }

    #[test]
    fn test_invalid_query_error() {
        let err = DistillError::invalid_query();
        assert_eq!(err.code(), ErrorCode::ValMissingQuery);
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_cancelled_error() {
        let err = DistillError::cancelled(PipelineStage::Clustering);
        assert!(err.is_cancelled());
        assert!(err.to_string().contains("clustering"));
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::ValMissingQuery.as_str(), "VAL_002");
        assert_eq!(ErrorCode::RetNotFound.as_str(), "RET_002");
        assert_eq!(ErrorCode::EmbContextTooLong.as_str(), "EMB_005");
    }
}
