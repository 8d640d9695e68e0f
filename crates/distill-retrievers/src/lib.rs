//! distill-retrievers - Retrieval backend implementations for distill.
//!
//! # Supported Providers
//!
//! - **InMemory** - Brute-force cosine search over locally held chunks,
//!   intended for tests, demos and small corpora.
//!
//! The Pinecone and Qdrant providers are enumerated for configuration
//! compatibility but are not wired in this crate; requesting them from the
//! factory reports an unsupported-provider error.
//!
//! # Example
//!
//! ```ignore
//! use distill_retrievers::RetrieverFactory;
//!
//! let retriever = RetrieverFactory::in_memory();
//! ```

mod factory;
mod memory;

pub use factory::RetrieverFactory;
pub use memory::InMemoryRetriever;

// Re-export core types for convenience
pub use distill_core::traits::{Retriever, RetrieverConfig, RetrieverProvider};
