use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use tracing::{debug, info};

use docaudit_ingest::embedding::{normalize, Embedder};

use crate::collection::{Collection, QueryHit, StoredDocument};
use crate::error::StoreError;
use crate::snapshot;

/// Named collections of embedded documents. Embedding happens outside the lock.
pub struct VectorStore {
    embedder: Arc<dyn Embedder>,
    collections: RwLock<HashMap<String, Collection>>,
}

impl VectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Collection>>, StoreError> {
        self.collections.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Collection>>, StoreError> {
        self.collections.write().map_err(|_| StoreError::LockPoisoned)
    }

    /// Create the collection if it does not exist yet.
    pub fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        self.write()?
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(name));
        Ok(())
    }

    /// Remove a collection and its documents. Returns whether it existed.
    pub fn delete_collection(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.write()?.remove(name).is_some())
    }

    pub fn has_collection(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.contains_key(name))
    }

    /// Number of documents in a collection.
    pub fn count(&self, name: &str) -> Result<usize, StoreError> {
        self.read()?
            .get(name)
            .map(Collection::len)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))
    }

    /// Embed `content` and store it under `id`, replacing any previous entry.
    pub async fn add_document(
        &self,
        collection: &str,
        id: &str,
        content: &str,
        metadata: IndexMap<String, String>,
    ) -> Result<(), StoreError> {
        if !self.has_collection(collection)? {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }

        let mut embedding = self.embedder.embed(content).await?;
        normalize(&mut embedding);

        let mut collections = self.write()?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        target.upsert(StoredDocument {
            id: id.to_string(),
            content: content.to_string(),
            metadata,
            embedding,
        });
        Ok(())
    }

    /// Top `k` documents most similar to `text`, best first.
    pub async fn query(&self, collection: &str, text: &str, k: usize) -> Result<Vec<QueryHit>, StoreError> {
        if !self.has_collection(collection)? {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }

        let mut query = self.embedder.embed(text).await?;
        normalize(&mut query);

        let collections = self.read()?;
        let target = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        let hits = target.query_by_vector(&query, k);
        debug!(collection, k, hits = hits.len(), "Vector query");
        Ok(hits)
    }

    /// Write every collection to `path` as one snapshot blob.
    pub fn export_to_file(&self, path: &Path, compress: bool) -> Result<(), StoreError> {
        let collections: Vec<Collection> = self.read()?.values().cloned().collect();
        let documents: usize = collections.iter().map(Collection::len).sum();
        let bytes = snapshot::encode(collections, compress)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &bytes)?;
        info!(path = %path.display(), documents, bytes = bytes.len(), "Exported vector store");
        Ok(())
    }

    /// Replace same-named collections with those stored in the snapshot at `path`.
    pub fn import_from_file(&self, path: &Path) -> Result<(), StoreError> {
        let bytes = std::fs::read(path)?;
        let restored = snapshot::decode(&bytes)?;

        let mut collections = self.write()?;
        let mut documents = 0;
        for collection in restored {
            documents += collection.len();
            collections.insert(collection.name().to_string(), collection);
        }
        info!(path = %path.display(), documents, "Imported vector store");
        Ok(())
    }
}
