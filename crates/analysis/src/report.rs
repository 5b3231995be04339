//! Markdown rendering and persistence of document analyses.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use crate::error::AnalysisError;
use crate::pipeline::DocumentAnalysis;

/// Render the report. Failed chunks count in the totals but get no detail section.
pub fn render_markdown(analysis: &DocumentAnalysis) -> String {
    let mut out = String::new();
    let _ = write!(out, "# Document analysis: {}\n\n", analysis.file_name);
    let _ = write!(
        out,
        "**Analyzed at:** {}\n\n",
        analysis.processed_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = write!(out, "**Total chunks:** {}\n\n", analysis.total_chunks);

    out.push_str("## Summary\n\n");
    let _ = writeln!(out, "- ✅ Analyzed: {}", analysis.success_count);
    let _ = write!(out, "- ❌ Errors: {}\n\n", analysis.error_count);

    out.push_str("## Detailed analysis\n\n");
    for result in analysis.results.iter().filter(|r| r.is_success()) {
        let _ = write!(out, "### Chunk {}: {}\n\n", result.chunk_index, result.chunk_section);
        let _ = write!(out, "**Relevant reference sections:** {}\n\n", result.reference_count);
        out.push_str("**Analysis:**\n\n");
        out.push_str(&result.analysis);
        out.push_str("\n\n---\n\n");
    }
    out
}

/// `<stem>_analysis_<YYYYmmdd_HHMMSS>.md` in the working directory.
pub fn default_report_path(input: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    PathBuf::from(format!("{stem}_analysis_{}.md", now.format("%Y%m%d_%H%M%S")))
}

pub fn save_report(analysis: &DocumentAnalysis, path: &Path) -> Result<(), AnalysisError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_markdown(analysis))?;
    info!(path = %path.display(), "Analysis report saved");
    Ok(())
}
