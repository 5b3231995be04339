use std::path::PathBuf;

use thiserror::Error;

use docaudit_ingest::{ChunkError, ExtractionError};
use docaudit_llm::LlmError;
use docaudit_store::StoreError;

/// Document- and chunk-level failures of the analysis pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no chunks produced from {0}")]
    EmptyDocument(String),

    #[error("no chunks were stored for {0}")]
    NothingIndexed(String),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] StoreError),

    #[error("inference failed: {0}")]
    Inference(#[from] LlmError),

    #[error("chunking failed: {0}")]
    Chunking(ChunkError),

    #[error("unsupported format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl From<ChunkError> for AnalysisError {
    fn from(err: ChunkError) -> Self {
        match err {
            ChunkError::Empty(source) => AnalysisError::EmptyDocument(source),
            other => AnalysisError::Chunking(other),
        }
    }
}
