use std::cmp::Ordering;
use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A stored chunk with its unit-length embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub content: String,
    pub metadata: IndexMap<String, String>,
    pub embedding: Vec<f32>,
}

/// A query match: the stored document projected with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub id: String,
    pub content: String,
    pub metadata: IndexMap<String, String>,
    pub similarity: f32,
}

/// Documents in insertion order, addressable by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Collection {
    name: String,
    documents: Vec<StoredDocument>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&StoredDocument> {
        self.positions.get(id).map(|&i| &self.documents[i])
    }

    /// Insert or replace by id. Re-adding identical chunks is a no-op in effect.
    pub fn upsert(&mut self, doc: StoredDocument) {
        match self.positions.get(&doc.id) {
            Some(&i) => self.documents[i] = doc,
            None => {
                self.positions.insert(doc.id.clone(), self.documents.len());
                self.documents.push(doc);
            }
        }
    }

    /// Rebuild the id lookup after deserialization.
    pub(crate) fn reindex(&mut self) {
        self.positions = self
            .documents
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.clone(), i))
            .collect();
    }

    /// Top `k` documents by dot product with a unit-length query, best first.
    /// Ties keep insertion order.
    pub fn query_by_vector(&self, query: &[f32], k: usize) -> Vec<QueryHit> {
        let mut scored: Vec<(usize, f32)> = self
            .documents
            .iter()
            .enumerate()
            .map(|(i, d)| (i, dot(&d.embedding, query)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        scored
            .into_iter()
            .take(k)
            .map(|(i, similarity)| {
                let d = &self.documents[i];
                QueryHit {
                    id: d.id.clone(),
                    content: d.content.clone(),
                    metadata: d.metadata.clone(),
                    similarity,
                }
            })
            .collect()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
