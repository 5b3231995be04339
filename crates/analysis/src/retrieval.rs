use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use docaudit_store::{QueryHit, VectorStore};

use crate::error::AnalysisError;

/// A stored reference chunk matched against a query, with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub content: String,
    pub section: String,
    pub source: String,
    pub similarity: f32,
}

impl From<QueryHit> for SearchResult {
    fn from(hit: QueryHit) -> Self {
        let field = |key: &str| hit.metadata.get(key).cloned().unwrap_or_default();
        Self {
            section: field("section"),
            source: field("source"),
            content: hit.content,
            similarity: hit.similarity,
        }
    }
}

/// Finds reference passages relevant to a query text.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Ranked by similarity, descending, with everything under the floor removed.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, AnalysisError>;
}

/// Top-K vector search over one store collection with a similarity floor.
pub struct StoreRetriever {
    store: Arc<VectorStore>,
    collection: String,
    top_k: usize,
    min_similarity: f32,
}

impl StoreRetriever {
    pub fn new(store: Arc<VectorStore>, collection: impl Into<String>, top_k: usize, min_similarity: f32) -> Self {
        Self {
            store,
            collection: collection.into(),
            top_k,
            min_similarity,
        }
    }
}

/// Drop results scored below `floor`.
pub fn apply_floor(results: Vec<SearchResult>, floor: f32) -> Vec<SearchResult> {
    results.into_iter().filter(|r| r.similarity >= floor).collect()
}

#[async_trait]
impl Retriever for StoreRetriever {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, AnalysisError> {
        let hits = self.store.query(&self.collection, query, self.top_k).await?;
        let total = hits.len();
        let results = apply_floor(hits.into_iter().map(SearchResult::from).collect(), self.min_similarity);
        debug!(total, kept = results.len(), floor = self.min_similarity, "Retrieved reference chunks");
        Ok(results)
    }
}
