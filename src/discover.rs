use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::DiscoverError;

/// Recursively collect files under `root` whose lower-cased extension is in
/// `extensions`, sorted by full path.
///
/// Every call re-scans the tree. Unreadable subdirectories are logged and
/// skipped; only an invalid root is an error.
pub fn discover(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, DiscoverError> {
    if !root.exists() {
        return Err(DiscoverError::InvalidRoot {
            path: root.to_path_buf(),
            reason: "does not exist",
        });
    }
    if !root.is_dir() {
        return Err(DiscoverError::InvalidRoot {
            path: root.to_path_buf(),
            reason: "not a directory",
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if has_allowed_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }

    // walk order is filesystem dependent
    files.sort();

    log::info!("Discovered {} audio files under {}", files.len(), root.display());
    Ok(files)
}

fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            extensions.iter().any(|allowed| *allowed == ext)
        })
        .unwrap_or(false)
}

/// Lower-case, strip leading dots, drop empties and duplicates.
pub fn normalize_extensions<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for ext in raw {
        let ext = ext.as_ref().trim().trim_start_matches('.').to_lowercase();
        if !ext.is_empty() && !out.contains(&ext) {
            out.push(ext);
        }
    }
    out
}
