//! Document intake: file extraction, the chunking engine and embedding backends.

pub mod document;
pub mod embedding;

pub use document::chunker::{Chunk, ChunkConfig, ChunkError, ChunkMethod, Chunker, ChunkerFactory};
pub use document::{is_supported, read_document, ExtractedDocument, ExtractionError};
pub use embedding::{Embedder, EmbeddingError, OpenAiEmbedder};
