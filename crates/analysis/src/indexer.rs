//! Reference document index lifecycle: load a snapshot when it is current,
//! otherwise chunk, embed and store the reference document one chunk at a time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use docaudit_core::config::ReferenceConfig;
use docaudit_ingest::{read_document, Chunk, ChunkerFactory};
use docaudit_store::{VectorStore, DEFAULT_COLLECTION};

use crate::error::AnalysisError;

/// Log indexing progress every this many chunks.
const PROGRESS_EVERY: usize = 5;

/// On-disk locations derived from the reference document name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub snapshot: PathBuf,
    pub metadata: PathBuf,
}

impl IndexPaths {
    /// `<data_dir>/<stem>.vdb` and `<data_dir>/<stem>_metadata.json`.
    pub fn for_reference(data_dir: &Path, reference: &Path) -> Self {
        let stem = reference
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "reference".to_string());
        Self {
            snapshot: data_dir.join(format!("{stem}.vdb")),
            metadata: data_dir.join(format!("{stem}_metadata.json")),
        }
    }
}

/// Size and modification time of an indexed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

impl FileInfo {
    pub fn from_path(path: &Path) -> Result<Self, AnalysisError> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            path: file_name(path),
            last_modified: DateTime::<Utc>::from(meta.modified()?),
            size: meta.len(),
        })
    }
}

/// Sidecar describing what the snapshot was built from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub files: BTreeMap<String, FileInfo>,
    pub data_path: String,
}

impl IndexMetadata {
    pub fn load(path: &Path) -> Result<Option<Self>, AnalysisError> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), AnalysisError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// True when `current` has no entry or its size or mtime changed.
    pub fn is_stale(&self, current: &FileInfo) -> bool {
        self.files
            .get(&current.path)
            .is_none_or(|known| known.size != current.size || known.last_modified != current.last_modified)
    }
}

/// How the reference index was made available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Loaded { documents: usize },
    Indexed { stored: usize, total: usize },
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Builds or restores the vector index for the reference document.
pub struct ReferenceIndexer {
    store: Arc<VectorStore>,
    factory: ChunkerFactory,
    chunk_method: Option<String>,
    data_dir: PathBuf,
    force_reindex: bool,
    delay: Duration,
}

impl ReferenceIndexer {
    pub fn new(
        store: Arc<VectorStore>,
        factory: ChunkerFactory,
        chunk_method: Option<String>,
        reference: &ReferenceConfig,
    ) -> Self {
        Self {
            store,
            factory,
            chunk_method,
            data_dir: reference.data_dir.clone(),
            force_reindex: reference.force_reindex,
            delay: Duration::from_millis(reference.index_delay_ms),
        }
    }

    /// Load the snapshot for `reference` when it is current, otherwise (re)index.
    pub async fn ensure_index(&self, reference: &Path) -> Result<IndexOutcome, AnalysisError> {
        let current = FileInfo::from_path(reference)?;
        let paths = IndexPaths::for_reference(&self.data_dir, reference);
        info!(snapshot = %paths.snapshot.display(), metadata = %paths.metadata.display(), "Reference index paths");

        if self.force_reindex {
            info!("Force reindex requested");
        } else if paths.snapshot.exists() {
            let stale = match IndexMetadata::load(&paths.metadata) {
                Ok(metadata) => metadata.is_some_and(|m| m.is_stale(&current)),
                Err(e) => {
                    warn!(path = %paths.metadata.display(), error = %e, "Unreadable index metadata, reindexing");
                    true
                }
            };
            if stale {
                info!(file = %current.path, "Reference document changed since indexing");
            } else if let Some(documents) = self.load_snapshot(&paths.snapshot)? {
                return Ok(IndexOutcome::Loaded { documents });
            }
        } else {
            info!("No snapshot found, indexing reference document");
        }

        let (stored, total) = self.index(reference).await?;

        let mut metadata = IndexMetadata {
            data_path: self.data_dir.display().to_string(),
            ..Default::default()
        };
        metadata.files.insert(current.path.clone(), current);
        metadata.save(&paths.metadata)?;
        self.store.export_to_file(&paths.snapshot, true)?;

        info!(stored, total, "Reference document indexed");
        Ok(IndexOutcome::Indexed { stored, total })
    }

    /// Import the snapshot. `None` when it holds no reference collection.
    fn load_snapshot(&self, path: &Path) -> Result<Option<usize>, AnalysisError> {
        self.store.import_from_file(path)?;
        if !self.store.has_collection(DEFAULT_COLLECTION)? {
            warn!(path = %path.display(), "Snapshot has no reference collection, reindexing");
            return Ok(None);
        }
        let documents = self.store.count(DEFAULT_COLLECTION)?;
        info!(documents, "Reference index loaded from snapshot");
        Ok(Some(documents))
    }

    /// Chunk the reference document and add chunks one at a time with a pause between calls.
    async fn index(&self, reference: &Path) -> Result<(usize, usize), AnalysisError> {
        let doc = read_document(reference)?;
        let chunks = self
            .factory
            .chunk_document(reference, &doc.full_text(), self.chunk_method.as_deref())?;
        let total = chunks.len();
        info!(file = %doc.filename, chunks = total, "Reference document split");

        self.store.delete_collection(DEFAULT_COLLECTION)?;
        self.store.create_collection(DEFAULT_COLLECTION)?;

        let mut stored = 0usize;
        for (i, chunk) in chunks.iter().enumerate() {
            match self.add_chunk(chunk).await {
                Ok(()) => stored += 1,
                Err(e) => warn!(chunk = i + 1, id = %chunk.id, error = %e, "Failed to add chunk"),
            }

            let done = i + 1;
            if done % PROGRESS_EVERY == 0 || done == total {
                info!(stored, processed = done, total, "Indexing progress");
            }
            if done < total && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        if stored == 0 {
            return Err(AnalysisError::NothingIndexed(doc.filename));
        }
        Ok((stored, total))
    }

    async fn add_chunk(&self, chunk: &Chunk) -> Result<(), AnalysisError> {
        let mut metadata = chunk.metadata.clone();
        metadata.insert("source".to_string(), chunk.source.clone());
        metadata.insert("section".to_string(), chunk.section.clone());
        self.store
            .add_document(DEFAULT_COLLECTION, &chunk.id, &chunk.text, metadata)
            .await?;
        Ok(())
    }
}
