//! Factory for creating retrieval backends.

use std::sync::Arc;

use distill_core::error::{DistillError, DistillResult};
use distill_core::traits::{Retriever, RetrieverConfig, RetrieverProvider};

use crate::memory::InMemoryRetriever;

/// Factory for creating retrieval backends.
pub struct RetrieverFactory;

impl RetrieverFactory {
    /// Create a retriever from the given configuration.
    pub fn create(
        provider: RetrieverProvider,
        config: RetrieverConfig,
    ) -> DistillResult<Arc<dyn Retriever>> {
        match provider {
            RetrieverProvider::InMemory => Ok(Arc::new(InMemoryRetriever::new(config))),
            _ => Err(DistillError::UnsupportedProvider {
                provider: format!("{provider:?}"),
            }),
        }
    }

    /// Create an in-memory retriever with default configuration.
    pub fn in_memory() -> Arc<InMemoryRetriever> {
        Arc::new(InMemoryRetriever::default_config())
    }

    /// Create an in-memory retriever with a default namespace.
    pub fn in_memory_with_namespace(namespace: impl Into<String>) -> Arc<InMemoryRetriever> {
        Arc::new(InMemoryRetriever::new(RetrieverConfig {
            default_namespace: namespace.into(),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_provider_is_supported() {
        let retriever = RetrieverFactory::create(RetrieverProvider::InMemory, RetrieverConfig::default());
        assert!(retriever.is_ok());
    }

    #[test]
    fn test_network_providers_are_not_wired() {
        for provider in [RetrieverProvider::Pinecone, RetrieverProvider::Qdrant] {
            let err = match RetrieverFactory::create(provider, RetrieverConfig::default()) {
                Err(e) => e,
                Ok(_) => panic!("expected an error"),
            };
            assert!(matches!(err, DistillError::UnsupportedProvider { .. }));
        }
    }
}
