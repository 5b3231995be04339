pub mod chunker;
mod pdf;
mod txt;

use std::path::Path;

use thiserror::Error;

/// Extensions the extractor can read.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "text", "pdf"];

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("PDF extraction failed: {0}")]
    PdfError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A page of extracted text.
#[derive(Debug, Clone)]
pub struct PageContent {
    /// 1-based page number (for PDFs). For TXT/MD, always 1.
    pub page_number: usize,
    pub text: String,
}

/// Result of extracting text from a document.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// Original filename.
    pub filename: String,
    /// File type: "pdf", "txt", "md"
    pub file_type: String,
    pub pages: Vec<PageContent>,
}

impl ExtractedDocument {
    /// All pages joined by blank lines, so page breaks read as paragraph breaks.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Total character count across all pages.
    pub fn total_chars(&self) -> usize {
        self.pages.iter().map(|p| p.text.chars().count()).sum()
    }
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Whether the path has an extension the extractor understands.
pub fn is_supported(path: &Path) -> bool {
    let ext = extension_of(&path.to_string_lossy());
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Extract text from file bytes based on file type.
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<ExtractedDocument, ExtractionError> {
    let ext = extension_of(filename);
    let file_type = match ext.as_str() {
        "pdf" => "pdf",
        "txt" | "text" => "txt",
        "md" | "markdown" => "md",
        other => return Err(ExtractionError::UnsupportedType(other.to_string())),
    };

    let pages = match file_type {
        "pdf" => pdf::extract_pdf(bytes)?,
        _ => txt::extract_txt(bytes)?,
    };

    Ok(ExtractedDocument {
        filename: filename.to_string(),
        file_type: file_type.to_string(),
        pages,
    })
}

/// Read and extract a document from disk.
pub fn read_document(path: &Path) -> Result<ExtractedDocument, ExtractionError> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    if !is_supported(path) {
        return Err(ExtractionError::UnsupportedType(extension_of(&filename)));
    }
    let bytes = std::fs::read(path)?;
    let doc = extract_text(&bytes, &filename)?;
    tracing::debug!(file = %filename, pages = doc.pages.len(), chars = doc.total_chars(), "Extracted document");
    Ok(doc)
}
