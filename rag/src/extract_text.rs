use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};

/// Resolves `file_url` against the upload root and returns normalized text.
pub fn extract_document(upload_root: &Path, source_id: &str, file_url: &str) -> Result<String> {
    let fail = |message: String| RagError::Extraction {
        source_id: source_id.to_string(),
        message,
    };
    if file_url.trim().is_empty() {
        return Err(fail("document has no file reference".to_string()));
    }

    let path = resolve(upload_root, file_url);
    if !path.is_file() {
        return Err(fail(format!("file not found: {}", path.display())));
    }

    let raw = if is_pdf(&path) {
        pdf_extract::extract_text(&path)
            .map_err(|e| fail(format!("invalid or unreadable PDF {}: {}", path.display(), e)))?
    } else {
        let bytes = fs::read(&path).map_err(|e| fail(format!("{}: {}", path.display(), e)))?;
        String::from_utf8_lossy(&bytes).into_owned()
    };

    let text = normalize_whitespace(&raw);
    if text.is_empty() {
        return Err(fail(format!("no extractable text in {}", path.display())));
    }
    tracing::debug!(source_id, path = %path.display(), chars = text.len(), "extracted document text");
    Ok(text)
}

/// Collapses every whitespace run to a single space and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn resolve(upload_root: &Path, file_url: &str) -> PathBuf {
    let path = Path::new(file_url.trim());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        upload_root.join(path)
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_runs_of_whitespace() {
        assert_eq!(normalize_whitespace("  a\n\n b\t\tc  "), "a b c");
        assert_eq!(normalize_whitespace(" \n\t "), "");
    }

    #[test]
    fn relative_urls_resolve_under_upload_root() {
        let root = Path::new("/srv/uploads");
        assert_eq!(resolve(root, "docs/a.pdf"), PathBuf::from("/srv/uploads/docs/a.pdf"));
        assert_eq!(resolve(root, "/tmp/b.txt"), PathBuf::from("/tmp/b.txt"));
    }
}
