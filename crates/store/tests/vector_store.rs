//! Vector store behaviour against a deterministic in-test embedder.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;

use docaudit_ingest::embedding::{Embedder, EmbeddingError};
use docaudit_store::{StoreError, VectorStore, DEFAULT_COLLECTION};

/// Bag-of-letters embedder: one dimension per ASCII letter.
struct LetterEmbedder {
    calls: AtomicUsize,
}

impl LetterEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 26];
                for b in t.bytes().filter(u8::is_ascii_alphabetic) {
                    v[(b.to_ascii_lowercase() - b'a') as usize] += 1.0;
                }
                v
            })
            .collect())
    }
}

fn meta(section: &str) -> IndexMap<String, String> {
    let mut m = IndexMap::new();
    m.insert("section".to_string(), section.to_string());
    m
}

async fn seeded_store(embedder: Arc<LetterEmbedder>) -> VectorStore {
    let store = VectorStore::new(embedder);
    store.create_collection(DEFAULT_COLLECTION).unwrap();
    for (id, text, section) in [
        ("1", "aaaa aaaa", "Alpha"),
        ("2", "bbbb bbbb", "Beta"),
        ("3", "aaaa bbbb", "Mixed"),
    ] {
        store
            .add_document(DEFAULT_COLLECTION, id, text, meta(section))
            .await
            .unwrap();
    }
    store
}

#[tokio::test]
async fn query_returns_most_similar_first() {
    let store = seeded_store(Arc::new(LetterEmbedder::new())).await;

    let hits = store.query(DEFAULT_COLLECTION, "aaa", 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "1");
    assert_eq!(hits[1].id, "3");
    assert!((hits[0].similarity - 1.0).abs() < 1e-5);
    assert!(hits[0].similarity >= hits[1].similarity);
}

#[tokio::test]
async fn missing_collection_is_reported() {
    let store = VectorStore::new(Arc::new(LetterEmbedder::new()));
    let err = store.query("nope", "text", 3).await.unwrap_err();
    assert!(matches!(err, StoreError::CollectionNotFound(name) if name == "nope"));

    let err = store
        .add_document("nope", "1", "text", IndexMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::CollectionNotFound(_)));
}

#[tokio::test]
async fn re_adding_same_id_does_not_duplicate() {
    let store = seeded_store(Arc::new(LetterEmbedder::new())).await;
    store
        .add_document(DEFAULT_COLLECTION, "1", "aaaa aaaa", meta("Alpha"))
        .await
        .unwrap();
    assert_eq!(store.count(DEFAULT_COLLECTION).unwrap(), 3);
}

#[tokio::test]
async fn snapshot_round_trip_answers_queries_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("reference.vdb");

    let embedder = Arc::new(LetterEmbedder::new());
    let original = seeded_store(embedder.clone()).await;
    original.export_to_file(&path, true).unwrap();

    let restored = VectorStore::new(embedder.clone());
    restored.import_from_file(&path).unwrap();
    assert!(restored.has_collection(DEFAULT_COLLECTION).unwrap());
    assert_eq!(restored.count(DEFAULT_COLLECTION).unwrap(), 3);

    let before = original.query(DEFAULT_COLLECTION, "abab", 3).await.unwrap();
    let after = restored.query(DEFAULT_COLLECTION, "abab", 3).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(after[0].metadata.get("section").map(String::as_str), Some("Mixed"));

    // 3 adds + 2 queries; importing must not re-embed.
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn deleted_collection_is_gone() {
    let store = seeded_store(Arc::new(LetterEmbedder::new())).await;
    assert!(store.delete_collection(DEFAULT_COLLECTION).unwrap());
    assert!(!store.has_collection(DEFAULT_COLLECTION).unwrap());
    assert!(!store.delete_collection(DEFAULT_COLLECTION).unwrap());
}
