use super::{ExtractionError, PageContent};

pub fn extract_pdf(bytes: &[u8]) -> Result<Vec<PageContent>, ExtractionError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ExtractionError::PdfError(e.to_string()))?;
    split_pages(&text)
}

/// pdf-extract returns one string; form feeds separate pages.
fn split_pages(text: &str) -> Result<Vec<PageContent>, ExtractionError> {
    if text.trim().is_empty() {
        return Err(ExtractionError::PdfError(
            "no extractable text (scanned or image-only PDF)".to_string(),
        ));
    }

    Ok(text
        .split('\x0C')
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| PageContent {
            page_number: i + 1,
            text: page.trim().to_string(),
        })
        .collect())
}
