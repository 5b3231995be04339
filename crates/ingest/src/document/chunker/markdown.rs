//! Heading-aware markdown chunker with adaptive split level.

use std::collections::BTreeMap;

use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use tracing::info;

use super::helpers::{char_len, create_chunk, pack_paragraphs, split_paragraphs};
use super::types::{Chunk, ChunkConfig, ChunkError, Chunker, Metadata};

/// Minimum heading counts for a level to qualify as the split level.
const LEVEL_THRESHOLDS: [(u8, usize); 3] = [(2, 3), (3, 5), (4, 10)];

// ── Structure analysis ──────────────────────────────────────────────────────

/// Heading and paragraph counts gathered in one pass over the parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentStructure {
    pub heading_counts: BTreeMap<u8, usize>,
    pub total_paragraphs: usize,
}

/// The heading level a markdown document is split on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingStrategy {
    pub level: u8,
}

impl DocumentStructure {
    fn analyze(events: &[Event<'_>]) -> Self {
        let mut structure = DocumentStructure::default();
        for event in events {
            match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    *structure.heading_counts.entry(*level as u8).or_default() += 1;
                }
                Event::Start(Tag::Paragraph) => structure.total_paragraphs += 1,
                _ => {}
            }
        }
        structure
    }

    /// First level from 2 to 4 whose heading count meets its threshold.
    pub fn select_strategy(&self) -> Result<ChunkingStrategy, ChunkError> {
        LEVEL_THRESHOLDS
            .iter()
            .find(|(level, min)| self.heading_counts.get(level).copied().unwrap_or(0) >= *min)
            .map(|(level, _)| ChunkingStrategy { level: *level })
            .ok_or_else(|| ChunkError::NoStructure {
                headings: self.heading_counts.clone(),
                paragraphs: self.total_paragraphs,
            })
    }
}

// ── Section accumulation ────────────────────────────────────────────────────

/// Text gathered under one split-level (or higher) heading.
struct RawSection {
    title: String,
    level: u8,
    parent: String,
    text: String,
}

/// Walk the events and cut the document at every heading of `target` level or above.
/// Deeper headings stay inline in the current section.
fn collect_sections(events: &[Event<'_>], target: u8) -> Vec<RawSection> {
    let mut sections = Vec::new();
    let mut current = RawSection {
        title: String::new(),
        level: 0,
        parent: String::new(),
        text: String::new(),
    };
    let mut parent = String::new();
    let mut heading: Option<String> = None;

    for event in events {
        match event {
            Event::Start(Tag::Heading { .. }) => heading = Some(String::new()),
            Event::End(TagEnd::Heading(level)) => {
                let level = *level as u8;
                let title = heading.take().unwrap_or_default().trim().to_string();

                if level <= target {
                    if level == target {
                        parent = title.clone();
                    }
                    let next = RawSection {
                        text: format!("{title}\n\n"),
                        title,
                        level,
                        parent: parent.clone(),
                    };
                    let finished = std::mem::replace(&mut current, next);
                    if !finished.text.trim().is_empty() {
                        sections.push(finished);
                    }
                } else {
                    current.text.push('\n');
                    current.text.push_str(&title);
                    current.text.push_str("\n\n");
                }
            }
            Event::Text(text) | Event::Code(text) => match heading.as_mut() {
                Some(buf) => buf.push_str(text),
                None => current.text.push_str(text),
            },
            Event::SoftBreak | Event::HardBreak => match heading.as_mut() {
                Some(buf) => buf.push(' '),
                None => current.text.push('\n'),
            },
            Event::End(TagEnd::Paragraph | TagEnd::CodeBlock | TagEnd::List(_)) => {
                current.text.push_str("\n\n");
            }
            Event::End(TagEnd::Item) => current.text.push('\n'),
            _ => {}
        }
    }

    if !current.text.trim().is_empty() {
        sections.push(current);
    }
    sections
}

// ── Chunker ─────────────────────────────────────────────────────────────────

/// Splits structured markdown on the densest usable heading level.
#[derive(Debug, Clone, Default)]
pub struct MarkdownChunker {
    config: ChunkConfig,
}

impl MarkdownChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    fn section_metadata(level: u8, part: Option<usize>, section: &RawSection) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("level".into(), level.to_string());
        if let Some(part) = part {
            metadata.insert("part".into(), part.to_string());
            metadata.insert("has_parts".into(), "true".into());
        }
        if !section.parent.is_empty() && section.parent != section.title {
            metadata.insert("parent_section".into(), section.parent.clone());
        }
        metadata
    }

    fn finalize_section(&self, section: &RawSection, source: &str) -> Vec<Chunk> {
        let text = section.text.trim();
        if char_len(text) <= self.config.max_chunk_size {
            let metadata = Self::section_metadata(section.level, None, section);
            return vec![create_chunk(text, source, section.title.clone(), metadata)];
        }
        self.split_large_section(text, section, source)
    }

    /// Oversized sections are cut on paragraph boundaries into numbered parts.
    /// Only sections below level 2 carry overlap between parts.
    fn split_large_section(&self, text: &str, section: &RawSection, source: &str) -> Vec<Chunk> {
        let overlap = if section.level > 2 { self.config.overlap } else { 0 };
        let paragraphs = split_paragraphs(text);
        let parts = pack_paragraphs(&paragraphs, self.config.max_chunk_size, overlap);
        let split = parts.len() > 1;

        parts
            .iter()
            .enumerate()
            .map(|(i, part)| {
                let num = i + 1;
                let label = if num > 1 {
                    format!("{} (part {num})", section.title)
                } else {
                    section.title.clone()
                };
                let metadata = Self::section_metadata(section.level, split.then_some(num), section);
                create_chunk(part, source, label, metadata)
            })
            .collect()
    }
}

impl Chunker for MarkdownChunker {
    fn chunk(&self, content: &str, source: &str) -> Result<Vec<Chunk>, ChunkError> {
        let events: Vec<Event<'_>> = Parser::new(content).collect();

        let structure = DocumentStructure::analyze(&events);
        let strategy = structure.select_strategy()?;
        info!(
            chunker = self.name(),
            headings = ?structure.heading_counts,
            paragraphs = structure.total_paragraphs,
            level = strategy.level,
            "Selected heading strategy"
        );

        let chunks: Vec<Chunk> = collect_sections(&events, strategy.level)
            .iter()
            .flat_map(|section| self.finalize_section(section, source))
            .collect();

        info!(chunker = self.name(), chunks = chunks.len(), "Markdown chunking complete");
        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "markdown"
    }
}
