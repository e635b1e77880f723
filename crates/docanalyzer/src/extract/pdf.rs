use std::path::Path;

use crate::error::ProcessError;
use crate::extract::{DocumentFormat, FormatExtractor};

/// Reads the embedded text layer of a PDF. Scanned pages without a text
/// layer contribute nothing.
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("extract.pdf").entered();

        let pdf_bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let doc = lopdf::Document::load_mem(&pdf_bytes)
            .map_err(|e| ProcessError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

        let pages = doc.get_pages();
        let mut text = String::new();
        let mut unreadable = 0usize;

        for (page_num, _) in &pages {
            match doc.extract_text(&[*page_num]) {
                Ok(page_text) => {
                    text.push_str(&page_text);
                    text.push('\n');
                }
                Err(e) => {
                    unreadable += 1;
                    log::debug!("Skipping page {} of {}: {}", page_num, path.display(), e);
                }
            }
        }

        if unreadable > 0 {
            log::warn!(
                "{} of {} pages in {} had no readable text",
                unreadable,
                pages.len(),
                path.display()
            );
        }

        Ok(text)
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Pdf)
    }
}
