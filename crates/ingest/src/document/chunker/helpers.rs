//! Text splitting and chunk construction utilities shared by the chunkers.

use sha2::{Digest, Sha256};

use super::types::{Chunk, Metadata};

/// Separator placed between paragraphs when they are packed into one chunk.
pub(crate) const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Length in characters (not bytes).
pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Content address of a chunk: first 8 bytes of SHA-256(text + source), hex encoded.
pub fn chunk_id(text: &str, source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(source.as_bytes());
    let digest = hasher.finalize();
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

/// Build a chunk from raw text. The text is trimmed before it is hashed.
pub fn create_chunk(text: &str, source: &str, section: impl Into<String>, metadata: Metadata) -> Chunk {
    let text = text.trim();
    Chunk {
        id: chunk_id(text, source),
        text: text.to_string(),
        source: source.to_string(),
        section: section.into(),
        metadata,
    }
}

/// The last `n` characters of `text`, or all of it when it is shorter.
pub fn last_n_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// Split on blank lines, dropping empty paragraphs.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    text.split(PARAGRAPH_SEPARATOR)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Greedily pack paragraphs into parts of at most `max_size` characters,
/// never splitting a paragraph. When `overlap > 0` every part after the first
/// starts with up to `overlap` trailing characters of the previous part; the
/// seed shrinks so it never pushes a part past `max_size`.
pub(crate) fn pack_paragraphs(paragraphs: &[&str], max_size: usize, overlap: usize) -> Vec<String> {
    let sep_len = char_len(PARAGRAPH_SEPARATOR);
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    // False while `current` holds only the previous part's tail.
    let mut has_own_content = false;

    for para in paragraphs {
        let para_len = char_len(para);

        if has_own_content && current_len + sep_len + para_len > max_size {
            let finished = std::mem::take(&mut current);
            current_len = 0;
            has_own_content = false;

            let seed = overlap.min(max_size.saturating_sub(sep_len + para_len));
            if seed > 0 {
                let tail = last_n_chars(&finished, seed);
                current.push_str(tail);
                current_len = char_len(tail);
            }
            parts.push(finished);
        }

        if !current.is_empty() {
            current.push_str(PARAGRAPH_SEPARATOR);
            current_len += sep_len;
        }
        current.push_str(para);
        current_len += para_len;
        has_own_content = true;
    }

    if has_own_content {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_stable_and_short() {
        let a = chunk_id("hello", "doc.md");
        let b = chunk_id("hello", "doc.md");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn chunk_id_depends_on_source() {
        assert_ne!(chunk_id("hello", "a.md"), chunk_id("hello", "b.md"));
    }

    #[test]
    fn create_chunk_trims_before_hashing() {
        let padded = create_chunk("  body \n", "a.txt", "S", Metadata::new());
        let plain = create_chunk("body", "a.txt", "S", Metadata::new());
        assert_eq!(padded.text, "body");
        assert_eq!(padded.id, plain.id);
    }

    #[test]
    fn last_n_chars_counts_characters() {
        assert_eq!(last_n_chars("абвгд", 2), "гд");
        assert_eq!(last_n_chars("abc", 10), "abc");
        assert_eq!(last_n_chars("abc", 0), "");
    }

    #[test]
    fn split_paragraphs_drops_blank_entries() {
        let paras = split_paragraphs("one\n\n\n\n  two  \n\nthree");
        assert_eq!(paras, vec!["one", "two", "three"]);
    }

    #[test]
    fn pack_without_overlap_respects_limit() {
        let paras = ["aaaa", "bbbb", "cccc"];
        let parts = pack_paragraphs(&paras, 10, 0);
        assert_eq!(parts, vec!["aaaa\n\nbbbb", "cccc"]);
    }

    #[test]
    fn pack_keeps_oversized_paragraph_whole() {
        let long = "x".repeat(30);
        let paras = ["short", long.as_str(), "tail"];
        let parts = pack_paragraphs(&paras, 10, 0);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 30);
    }

    #[test]
    fn pack_seeds_overlap() {
        let paras = ["first part", "second part"];
        let parts = pack_paragraphs(&paras, 20, 4);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1], "part\n\nsecond part");
    }

    #[test]
    fn pack_shrinks_seed_to_stay_within_limit() {
        let paras: Vec<String> = (b'a'..=b'd').map(|c| char::from(c).to_string().repeat(90)).collect();
        let paras: Vec<&str> = paras.iter().map(String::as_str).collect();
        let parts = pack_paragraphs(&paras, 100, 20);

        assert_eq!(parts.len(), 4);
        for pair in parts.windows(2) {
            assert!(pair[1].starts_with(last_n_chars(&pair[0], 8)));
        }
        assert!(parts.iter().all(|p| char_len(p) <= 100));
    }

    #[test]
    fn pack_drops_seed_when_paragraph_fills_part() {
        let full = "y".repeat(98);
        let paras = ["xxxx", full.as_str()];
        let parts = pack_paragraphs(&paras, 100, 20);
        assert_eq!(parts, vec!["xxxx".to_string(), full]);
    }
}
