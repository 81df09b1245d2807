use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::config::Config;
use crate::sources::Source;

/// Walks `dir` (or the configured source dir) and returns one `document`
/// source per eligible file. File references are absolute so they resolve
/// regardless of the upload root.
pub fn scan_documents(cfg: &Config, dir: Option<&str>) -> Vec<Source> {
    let base = dir.unwrap_or(&cfg.source_dir);
    let mut results = Vec::new();

    let walker = WalkDir::new(base).into_iter().filter_entry(|e| {
        let name = e.file_name().to_string_lossy();
        !cfg.exclude_dirs.iter().any(|d| d == &name)
    });

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !has_extension(path, &cfg.include_exts) {
            continue;
        }
        match fs::metadata(path) {
            Ok(meta) if meta.len() > cfg.max_file_bytes => {
                tracing::debug!(path = %path.display(), bytes = meta.len(), "skipping oversized file");
                continue;
            }
            Ok(_) => {}
            Err(_) => continue,
        }
        let abs = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let file_url = abs.to_string_lossy().to_string();
        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file_url.clone());
        let id = format!("file:{}", path.strip_prefix(base).unwrap_or(path).display());
        results.push(Source::document(&id, &cfg.agent_id, &title, &file_url));
    }

    results
}

fn has_extension(path: &Path, exts: &[String]) -> bool {
    let lower = path.to_string_lossy().to_lowercase();
    exts.iter().any(|ext| lower.ends_with(&ext.to_lowercase()))
}
