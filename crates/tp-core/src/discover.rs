//! Discovery of telemetry files under a directory tree.

use crate::error::IngestError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Regular files under `root` whose name contains `name_contains` and ends
/// with `suffix`, sorted by path.
pub fn discover(root: &Path, name_contains: &str, suffix: &str) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.contains(name_contains) && name.ends_with(suffix) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}
