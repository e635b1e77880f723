//! Helpers for keeping logs and span attributes free of sensitive or bulky
//! data (staging paths, provider error bodies echoing document text).

use std::path::Path;

/// Maximum length of a third-party message carried into logs or job results.
pub const MAX_LOGGED_BODY_CHARS: usize = 200;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Truncates on a char boundary to [`MAX_LOGGED_BODY_CHARS`].
pub fn truncate_for_log(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_LOGGED_BODY_CHARS) {
        Some((idx, _)) => format!("{}... (truncated)", &body[..idx]),
        None => body.to_string(),
    }
}
