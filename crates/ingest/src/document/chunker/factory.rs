//! Chunker resolution from an explicit method name or the file extension.

use std::path::Path;

use tracing::{info, warn};

use super::markdown::MarkdownChunker;
use super::text::TextChunker;
use super::types::{Chunk, ChunkConfig, ChunkError, Chunker};

/// The two chunker variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkMethod {
    Markdown,
    Text,
}

impl ChunkMethod {
    /// Parse an explicit method name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self, ChunkError> {
        match name.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(ChunkMethod::Markdown),
            "simple" | "text" | "txt" => Ok(ChunkMethod::Text),
            _ => Err(ChunkError::UnknownMethod(name.to_string())),
        }
    }

    /// Sniff the method from a path. Unknown extensions use the text chunker.
    pub fn from_extension(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "md" | "markdown" => ChunkMethod::Markdown,
            _ => ChunkMethod::Text,
        }
    }

    /// An explicit, non-empty method name wins over the extension.
    pub fn resolve(path: &Path, explicit: Option<&str>) -> Result<Self, ChunkError> {
        match explicit.map(str::trim).filter(|m| !m.is_empty()) {
            Some(name) => Self::from_name(name),
            None => Ok(Self::from_extension(path)),
        }
    }
}

/// Builds chunkers from a shared configuration.
#[derive(Debug, Clone, Default)]
pub struct ChunkerFactory {
    config: ChunkConfig,
}

impl ChunkerFactory {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn get_chunker_by_method(&self, method: ChunkMethod) -> Box<dyn Chunker> {
        match method {
            ChunkMethod::Markdown => Box::new(MarkdownChunker::new(self.config.clone())),
            ChunkMethod::Text => Box::new(TextChunker::new(self.config.clone())),
        }
    }

    pub fn get_chunker(&self, path: &Path, explicit: Option<&str>) -> Result<Box<dyn Chunker>, ChunkError> {
        let method = ChunkMethod::resolve(path, explicit)?;
        Ok(self.get_chunker_by_method(method))
    }

    /// Chunk a document, retrying with the text chunker when markdown has no
    /// usable structure. Zero chunks from either path is an error.
    pub fn chunk_document(
        &self,
        path: &Path,
        content: &str,
        explicit: Option<&str>,
    ) -> Result<Vec<Chunk>, ChunkError> {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let chunker = self.get_chunker(path, explicit)?;
        info!(chunker = chunker.name(), source = %source, "Chunking document");

        let chunks = match chunker.chunk(content, &source) {
            Ok(chunks) => chunks,
            Err(e) if e.is_structural() => {
                warn!(source = %source, error = %e, "Markdown structure unusable, falling back to text chunker");
                self.get_chunker_by_method(ChunkMethod::Text)
                    .chunk(content, &source)?
            }
            Err(e) => return Err(e),
        };

        if chunks.is_empty() {
            return Err(ChunkError::Empty(source));
        }
        Ok(chunks)
    }
}
