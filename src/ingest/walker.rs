use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Result, XmlShredError};

/// Discover every `.xml` file (case-insensitive) under `root`, sorted by path.
///
/// Unreadable entries are skipped. Files sharing a final path component in
/// different directories are all returned; the second one will be rejected as
/// a duplicate when ingested, since files are stored by name.
pub fn discover_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(XmlShredError::Config(format!(
            "not a directory: {}",
            root.display()
        )));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("xml"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    log::info!("Discovered {} XML files in {}", files.len(), root.display());
    Ok(files)
}
