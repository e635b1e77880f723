use std::path::Path;

use crate::error::ProcessError;
use crate::extract::{DocumentFormat, FormatExtractor};

pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, ProcessError> {
        let bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Text)
    }
}
