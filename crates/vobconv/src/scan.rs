use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use crate::config::ConvertConfig;
use crate::error::BatchError;
use log::{debug, info, warn};

/// A discovered source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub parent: PathBuf,
}

impl SourceFile {
    pub fn new(path: PathBuf) -> Self {
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        SourceFile { path, parent }
    }

    /// File name for display, falling back to the full path
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Enumerate every source file under `root`, once
///
/// Walks the whole tree in a single pass (each directory exactly once),
/// sorted by file name so the order is stable between runs. The returned
/// list is both the batch denominator and the execution order. Unreadable
/// entries below the root are logged and skipped; an unreadable root is an error.
pub fn discover_sources(cfg: &ConvertConfig, root: &Path) -> Result<Vec<SourceFile>, BatchError> {
    if !root.is_dir() {
        return Err(BatchError::RootNotFound(root.to_path_buf()));
    }

    info!("Scanning directory: {}", root.display());

    let mut sources = Vec::new();
    let mut entry_count = 0;
    let walker = WalkDir::new(root)
        .follow_links(cfg.follow_links)
        .sort_by_file_name();

    for entry in walker.into_iter() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.depth() == 0 => return Err(BatchError::Walk(e)),
            Err(e) => {
                warn!("Error reading directory entry: {}", e);
                continue;
            }
        };
        entry_count += 1;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !cfg.is_source_path(path) {
            continue;
        }

        debug!("Found source file: {}", path.display());
        sources.push(SourceFile::new(path.to_path_buf()));
    }

    info!(
        "Finished scanning {}: {} entries, {} .{} files",
        root.display(),
        entry_count,
        sources.len(),
        cfg.source_extension
    );
    Ok(sources)
}
