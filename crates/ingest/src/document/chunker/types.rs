//! Chunk configuration, output types and the chunker capability.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use docaudit_core::config::ChunkingConfig;

/// Ordered key/value annotations attached to a chunk.
pub type Metadata = IndexMap<String, String>;

// ── Configuration ───────────────────────────────────────────────────────────

/// Configuration shared by every chunker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Maximum chunk length in characters (default: 1000).
    pub max_chunk_size: usize,
    /// Trailing characters of one chunk repeated at the start of the next (default: 200).
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl From<&ChunkingConfig> for ChunkConfig {
    fn from(config: &ChunkingConfig) -> Self {
        Self {
            max_chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
        }
    }
}

// ── Chunk output ────────────────────────────────────────────────────────────

/// An immutable, content-addressed unit of document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Hex of the first 8 bytes of SHA-256(text + source).
    pub id: String,
    /// Trimmed chunk text.
    pub text: String,
    /// File name of the originating document.
    pub source: String,
    /// Heading title, `"<title> (part N)"`, or `"Chunk N"` for plain text.
    pub section: String,
    pub metadata: Metadata,
}

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ChunkError {
    /// The markdown chunker found no heading level dense enough to split on.
    #[error("no suitable markdown structure found (headings: {headings:?}, paragraphs: {paragraphs})")]
    NoStructure {
        headings: BTreeMap<u8, usize>,
        paragraphs: usize,
    },

    #[error("no chunks created from {0}")]
    Empty(String),

    #[error("unknown chunking method: {0}")]
    UnknownMethod(String),
}

impl ChunkError {
    /// True for the structural failure callers recover from with the text chunker.
    pub fn is_structural(&self) -> bool {
        matches!(self, ChunkError::NoStructure { .. })
    }
}

// ── Capability ──────────────────────────────────────────────────────────────

/// Splits document content into an ordered sequence of chunks.
pub trait Chunker: Send + Sync {
    fn chunk(&self, content: &str, source: &str) -> Result<Vec<Chunk>, ChunkError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
