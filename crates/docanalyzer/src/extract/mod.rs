pub mod pdf;
pub mod text;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ProcessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Text,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" | "md" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Turns a staged document into plain text for analysis.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, path: &Path) -> Result<String, ProcessError>;
}

/// A single-format extractor that the registry can dispatch to.
pub trait FormatExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ProcessError>;
    fn supports(&self, format: DocumentFormat) -> bool;
}

/// Dispatches on the artifact's extension.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn FormatExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: vec![
                Box::new(pdf::PdfExtractor::new()),
                Box::new(text::PlainTextExtractor::new()),
            ],
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtractor for ExtractorRegistry {
    fn extract_text(&self, path: &Path) -> Result<String, ProcessError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let format = DocumentFormat::from_extension(extension)
            .ok_or_else(|| ProcessError::UnsupportedFormat(extension.to_string()))?;

        let extractor = self
            .extractors
            .iter()
            .find(|e| e.supports(format))
            .ok_or_else(|| ProcessError::UnsupportedFormat(extension.to_string()))?;

        let text = normalize_text(&extractor.extract(path)?);
        if text.is_empty() {
            return Err(ProcessError::EmptyDocument);
        }
        Ok(text)
    }
}

/// Drops blank lines and trailing whitespace.
pub fn normalize_text(raw: &str) -> String {
    raw.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
