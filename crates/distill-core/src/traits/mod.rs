//! Collaborator traits for the broker.

mod embedder;
mod retriever;

pub use embedder::{Embedder, EmbedderConfig, EmbedderProvider};
pub use retriever::{Retriever, RetrieverConfig, RetrieverProvider};
