//! Budgeted prompt assembly.
//!
//! The prompt is laid out as a fixed header (role line and the analyzed text),
//! the packed reference context, and a fixed task block. Only the context is
//! sized dynamically: it must fit in `max_prompt_chars - reservation - header`.

use indexmap::IndexMap;

use crate::retrieval::SearchResult;

/// Upper bound on distinct sections packed into one prompt.
pub const MAX_GROUPS: usize = 5;

const SYSTEM_LINE: &str = "You are an expert in comparing legal and regulatory documents.";
const CONTEXT_HEADING: &str = "Relevant sections from reference document:\n";
const TRUNCATION_MARKER: &str = "...";
const UNKNOWN_SECTION: &str = "Unknown";

const TASK_BLOCK: &str = "Task:\n\
1. Compare the analyzed text with the reference sections\n\
2. Find contradictions, inconsistencies and risks\n\
3. Assess the degree of compliance\n\
4. Give concrete recommendations\n\
\n\
Output format:\n\
- Status: [✅ Compliant / ⚠️ Partially compliant / ❌ Contradiction]\n\
- Issues: <list of issues>\n\
- Recommendations: <recommendations>\n";

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Results grouped by section label in first-seen order.
struct SectionGroup<'a> {
    label: &'a str,
    members: Vec<&'a SearchResult>,
}

fn group_by_section(results: &[SearchResult]) -> Vec<SectionGroup<'_>> {
    let mut groups: IndexMap<&str, Vec<&SearchResult>> = IndexMap::new();
    for r in results {
        let label = if r.section.is_empty() { UNKNOWN_SECTION } else { r.section.as_str() };
        groups.entry(label).or_default().push(r);
    }
    groups
        .into_iter()
        .map(|(label, members)| SectionGroup { label, members })
        .collect()
}

fn render_entry(n: usize, label: &str, similarity: f32, body: &str) -> String {
    format!("{n}. [Section: {label}] (similarity: {similarity:.2})\n<<<\n{body}>>>\n\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBuilder {
    max_prompt_chars: usize,
    reservation: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            max_prompt_chars: 6000,
            reservation: 500,
        }
    }
}

impl PromptBuilder {
    pub fn new(max_prompt_chars: usize, reservation: usize) -> Self {
        Self {
            max_prompt_chars,
            reservation,
        }
    }

    fn header(input: &str) -> String {
        format!("{SYSTEM_LINE}\n\nAnalyzed text:\n<<<\n{input}\n>>>\n\n{CONTEXT_HEADING}")
    }

    /// Context entries for `results`, fitted into `available` characters.
    ///
    /// A group that does not fit is truncated to the remaining room and marked;
    /// once not even the marker fits, packing stops.
    pub fn pack_context(results: &[SearchResult], available: usize) -> Vec<String> {
        let mut entries = Vec::new();
        let mut used = 0usize;

        for group in group_by_section(results).into_iter().take(MAX_GROUPS) {
            let n = entries.len() + 1;
            let similarity = group.members.first().map(|r| r.similarity).unwrap_or_default();
            let combined: String = group
                .members
                .iter()
                .map(|r| format!("{}\n", r.content))
                .collect();

            let overhead = char_len(&render_entry(n, group.label, similarity, ""));
            let remaining = available.saturating_sub(used);

            let entry = if overhead + char_len(&combined) <= remaining {
                render_entry(n, group.label, similarity, &combined)
            } else {
                let reserved = overhead + char_len(TRUNCATION_MARKER);
                if remaining <= reserved {
                    break;
                }
                let body = format!("{}{TRUNCATION_MARKER}", take_chars(&combined, remaining - reserved));
                render_entry(n, group.label, similarity, &body)
            };

            used += char_len(&entry);
            entries.push(entry);
        }

        entries
    }

    /// Assemble the full prompt for `input` against the retrieved reference chunks.
    pub fn build(&self, input: &str, results: &[SearchResult]) -> String {
        let header = Self::header(input);
        let available = self
            .max_prompt_chars
            .saturating_sub(self.reservation)
            .saturating_sub(char_len(&header));

        let mut prompt = header;
        for entry in Self::pack_context(results, available) {
            prompt.push_str(&entry);
        }
        prompt.push_str(TASK_BLOCK);
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(section: &str, content: &str, similarity: f32) -> SearchResult {
        SearchResult {
            content: content.to_string(),
            section: section.to_string(),
            source: "ref.md".to_string(),
            similarity,
        }
    }

    fn context_of(prompt: &str) -> &str {
        let start = prompt.find(CONTEXT_HEADING).unwrap() + CONTEXT_HEADING.len();
        let end = prompt.find("Task:\n").unwrap();
        &prompt[start..end]
    }

    #[test]
    fn groups_by_section_in_first_seen_order() {
        let results = vec![
            result("B", "b1", 0.9),
            result("A", "a1", 0.8),
            result("B", "b2", 0.7),
            result("", "u1", 0.6),
        ];
        let entries = PromptBuilder::pack_context(&results, 10_000);

        assert_eq!(entries.len(), 3);
        assert!(entries[0].starts_with("1. [Section: B] (similarity: 0.90)\n<<<\nb1\nb2\n>>>"));
        assert!(entries[1].starts_with("2. [Section: A] (similarity: 0.80)"));
        assert!(entries[2].starts_with("3. [Section: Unknown] (similarity: 0.60)"));
    }

    #[test]
    fn caps_groups_at_five() {
        let results: Vec<SearchResult> = (0..8).map(|i| result(&format!("S{i}"), "x", 0.9)).collect();
        let prompt = PromptBuilder::new(100_000, 500).build("input", &results);
        assert_eq!(context_of(&prompt).matches("[Section: ").count(), MAX_GROUPS);
    }

    #[test]
    fn overflowing_group_is_truncated_with_marker() {
        let long = "y".repeat(500);
        let results = vec![result("Big", &long, 0.9)];
        let entries = PromptBuilder::pack_context(&results, 200);

        assert_eq!(entries.len(), 1);
        assert!(entries[0].contains("...>>>"));
        assert!(entries[0].chars().count() <= 200);
    }

    #[test]
    fn stops_packing_when_no_room_remains() {
        let results = vec![result("A", &"a".repeat(120), 0.9), result("B", "b", 0.8)];
        let entries = PromptBuilder::pack_context(&results, 120);

        assert_eq!(entries.len(), 1);
        assert!(entries[0].contains("[Section: A]"));
    }

    #[test]
    fn nothing_packed_when_budget_is_exhausted() {
        assert!(PromptBuilder::pack_context(&[result("A", "a", 0.9)], 10).is_empty());
    }

    #[test]
    fn packed_context_fits_budget_minus_reservation() {
        let results: Vec<SearchResult> = (0..6)
            .map(|i| result(&format!("Section {i}"), &"z".repeat(400), 0.8))
            .collect();
        let builder = PromptBuilder::new(1500, 500);
        let prompt = builder.build("short input", &results);

        assert!(char_len(context_of(&prompt)) <= 1500 - 500);
        assert!(prompt.starts_with(SYSTEM_LINE));
        assert!(prompt.contains("Analyzed text:\n<<<\nshort input\n>>>"));
        assert!(prompt.ends_with(TASK_BLOCK));
    }

    #[test]
    fn empty_results_still_produce_task() {
        let prompt = PromptBuilder::default().build("text", &[]);
        assert!(context_of(&prompt).is_empty());
        assert!(prompt.contains("Status: [✅ Compliant"));
    }
}
