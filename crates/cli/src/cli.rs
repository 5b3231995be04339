use std::path::PathBuf;

use clap::Parser;

use docaudit_core::Config;

/// Compare documents against an indexed reference document.
///
/// Reads one input per line from stdin: an existing file path is chunked and
/// analyzed chunk by chunk, anything else is answered as a free-text query.
#[derive(Parser, Debug, Default)]
#[command(name = "docaudit", about = "Compliance analysis against a reference document")]
pub struct CliArgs {
    /// Reference document to index (.md, .txt or .pdf)
    #[arg(long)]
    pub reference_doc: Option<PathBuf>,

    /// Directory for the vector snapshot and index metadata
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Report path used for every analyzed file (default: <stem>_analysis_<timestamp>.md)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Chunking method: markdown, md, simple, text or txt (default: by extension)
    #[arg(long)]
    pub chunk_method: Option<String>,

    /// Rebuild the reference index even when a snapshot exists
    #[arg(long)]
    pub force_reindex: bool,

    /// Configuration profile (overrides DOCAUDIT_PROFILE)
    #[arg(long, env = "DOCAUDIT_PROFILE")]
    pub profile: Option<String>,
}

impl CliArgs {
    /// Flags take precedence over environment configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(doc) = &self.reference_doc {
            config.reference.reference_doc = Some(doc.clone());
        }
        if let Some(data) = &self.data {
            config.reference.data_dir = data.clone();
        }
        if let Some(method) = self.chunk_method.as_ref().filter(|m| !m.trim().is_empty()) {
            config.chunking.chunk_method = Some(method.clone());
        }
        if self.force_reindex {
            config.reference.force_reindex = true;
        }
    }
}
