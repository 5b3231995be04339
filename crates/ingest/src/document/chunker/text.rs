//! Plain-text chunker: paragraph packing, or fixed-width slicing for flat input.

use tracing::info;

use super::helpers::{create_chunk, pack_paragraphs, split_paragraphs, PARAGRAPH_SEPARATOR};
use super::types::{Chunk, ChunkConfig, ChunkError, Chunker, Metadata};

#[derive(Debug, Clone, Default)]
pub struct TextChunker {
    config: ChunkConfig,
}

impl TextChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    fn metadata(num: usize, method: &str) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("chunk_num".into(), num.to_string());
        metadata.insert("method".into(), method.to_string());
        metadata
    }

    fn chunk_by_paragraphs(&self, content: &str, source: &str) -> Vec<Chunk> {
        let paragraphs = split_paragraphs(content);
        pack_paragraphs(&paragraphs, self.config.max_chunk_size, self.config.overlap)
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let num = i + 1;
                create_chunk(text, source, format!("Chunk {num}"), Self::metadata(num, "paragraphs"))
            })
            .collect()
    }

    /// Fixed-width windows over characters, advancing by `max - overlap` (at least 1).
    fn chunk_by_size(&self, content: &str, source: &str) -> Vec<Chunk> {
        let chars: Vec<char> = content.chars().collect();
        let size = self.config.max_chunk_size.max(1);
        let stride = size.saturating_sub(self.config.overlap).max(1);

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut num = 1;
        while start < chars.len() {
            let end = (start + size).min(chars.len());
            let text: String = chars[start..end].iter().collect();
            if !text.trim().is_empty() {
                chunks.push(create_chunk(&text, source, format!("Chunk {num}"), Self::metadata(num, "size")));
                num += 1;
            }
            if end >= chars.len() {
                break;
            }
            start += stride;
        }
        chunks
    }
}

impl Chunker for TextChunker {
    fn chunk(&self, content: &str, source: &str) -> Result<Vec<Chunk>, ChunkError> {
        let (chunks, method) = if content.contains(PARAGRAPH_SEPARATOR) {
            (self.chunk_by_paragraphs(content, source), "paragraphs")
        } else {
            (self.chunk_by_size(content, source), "size")
        };
        info!(chunker = self.name(), method, chunks = chunks.len(), "Text chunking complete");
        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "text"
    }
}
