//! Broker pipeline over the real in-memory collaborators.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use distill_core::{Broker, BrokerConfig, Chunk, Embedder, Filter, RetrievalRequest};
use distill_embeddings::EmbedderFactory;
use distill_retrievers::RetrieverFactory;

async fn seed_corpus(
    retriever: &distill_retrievers::InMemoryRetriever,
    embedder: &Arc<dyn Embedder>,
    docs: &[(&str, &str)],
) {
    let cancel = CancellationToken::new();
    let mut chunks = Vec::with_capacity(docs.len());
    for (id, text) in docs {
        let embedding = embedder.embed(text, &cancel).await.unwrap();
        chunks.push(Chunk::new(*id, *text, embedding, 0.0));
    }
    retriever.upsert("", chunks).await;
}

#[tokio::test]
async fn text_query_collapses_exact_duplicates() {
    let retriever = RetrieverFactory::in_memory();
    let embedder = EmbedderFactory::in_memory_with_dims(64);

    // Two documents share the same body and therefore the same embedding.
    seed_corpus(
        &retriever,
        &embedder,
        &[
            ("doc-1", "rust ownership explained"),
            ("doc-2", "rust ownership explained"),
            ("doc-3", "async runtimes compared"),
            ("doc-4", "error handling with thiserror"),
        ],
    )
    .await;

    let broker =
        Broker::new(retriever, BrokerConfig::default()).with_embedder(embedder);
    let result = broker
        .retrieve_by_text("rust ownership explained", "", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.stats.retrieved, 4);
    assert_eq!(result.stats.clustered, 3);
    assert_eq!(result.stats.returned, 3);

    // Exactly one of the duplicate pair survives.
    let ids: Vec<&str> = result.chunks.iter().map(|c| c.id.as_str()).collect();
    let duplicates = ids.iter().filter(|id| **id == "doc-1" || **id == "doc-2").count();
    assert_eq!(duplicates, 1);
}

#[tokio::test]
async fn filters_are_routed_to_the_retriever() {
    let retriever = RetrieverFactory::in_memory();
    let embedder = EmbedderFactory::in_memory_with_dims(64);
    let cancel = CancellationToken::new();

    let mut chunks = Vec::new();
    for (id, text, lang) in [
        ("en-1", "memory management", "en"),
        ("en-2", "borrow checker", "en"),
        ("de-1", "speicherverwaltung", "de"),
    ] {
        let embedding = embedder.embed(text, &cancel).await.unwrap();
        let mut chunk = Chunk::new(id, text, embedding, 0.0);
        chunk
            .metadata
            .insert("lang".to_string(), serde_json::json!(lang));
        chunks.push(chunk);
    }
    retriever.upsert("", chunks).await;

    let broker =
        Broker::new(retriever, BrokerConfig::default()).with_embedder(embedder.clone());

    let req = RetrievalRequest {
        query: "memory management".to_string(),
        filter: Some(Filter::eq("lang", "en")),
        ..Default::default()
    };
    let result = broker.retrieve(&req, &cancel).await.unwrap();

    assert_eq!(result.stats.retrieved, 2);
    assert!(result.chunks.iter().all(|c| c.metadata["lang"] == "en"));
}

#[tokio::test]
async fn cached_embedder_skips_repeat_queries() {
    let retriever = RetrieverFactory::in_memory();
    let cached = EmbedderFactory::cached(EmbedderFactory::in_memory_with_dims(64));
    let cancel = CancellationToken::new();

    seed_corpus(
        &retriever,
        &(cached.clone() as Arc<dyn Embedder>),
        &[("doc-1", "lifetimes and borrows")],
    )
    .await;

    let broker = Broker::new(retriever, BrokerConfig::default())
        .with_embedder(cached.clone());

    broker
        .retrieve_by_text("lifetimes and borrows", "", &cancel)
        .await
        .unwrap();
    broker
        .retrieve_by_text("lifetimes and borrows", "", &cancel)
        .await
        .unwrap();

    // The corpus seed and the two identical queries share one cache entry.
    assert_eq!(cached.cached_count(), 1);
}
