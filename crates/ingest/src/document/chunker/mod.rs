//! Adaptive chunking engine.
//!
//! Splits extracted documents into bounded, overlap-preserving chunks:
//! markdown is cut on the densest usable heading level, everything else is
//! packed by paragraphs or sliced at a fixed width.

mod factory;
mod helpers;
mod markdown;
mod text;
mod types;

pub use factory::{ChunkMethod, ChunkerFactory};
pub use helpers::{chunk_id, create_chunk, last_n_chars, split_paragraphs};
pub use markdown::{ChunkingStrategy, DocumentStructure, MarkdownChunker};
pub use text::TextChunker;
pub use types::{Chunk, ChunkConfig, ChunkError, Chunker, Metadata};
