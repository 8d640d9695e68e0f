//! distill-embeddings - Embedding provider implementations for distill.
//!
//! # Supported Providers
//!
//! - **InMemory** - Deterministic pseudo-embeddings derived from a SHA-256
//!   digest of the input text. No network access; intended for tests and
//!   offline pipelines.
//! - **CachedEmbedder** - Wrapper adding a text-to-vector cache around any
//!   embedder.
//!
//! The OpenAI provider is enumerated for configuration compatibility but is
//! not wired in this crate; requesting it from the factory reports an
//! unsupported-provider error.
//!
//! # Example
//!
//! ```ignore
//! use distill_embeddings::EmbedderFactory;
//!
//! let embedder = EmbedderFactory::in_memory_with_dims(384);
//! let cached = EmbedderFactory::cached(embedder);
//! ```

mod cached;
mod factory;
mod memory;

pub use cached::CachedEmbedder;
pub use factory::EmbedderFactory;
pub use memory::InMemoryEmbedder;

// Re-export core types for convenience
pub use distill_core::traits::{Embedder, EmbedderConfig, EmbedderProvider};
