use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, TrimError};
use crate::parsing::is_version_dir_name;
use crate::types::{ApiSurface, TrimOptions, VersionEntry};

/// Directories that never hold API code worth looking at.
fn is_skipped_dir(name: &str) -> bool {
    name.starts_with('.') || name == "__pycache__" || name == "node_modules"
}

/// Walk `options.root` and group every version folder by its parent directory.
///
/// Version folders are not descended into. Unreadable subdirectories are
/// logged and skipped; only a missing or unreadable root is an error.
pub fn scan(options: &TrimOptions) -> Result<Vec<ApiSurface>> {
    let root = &options.root;
    let metadata = fs::metadata(root).map_err(|e| TrimError::scan(root, e))?;
    if !metadata.is_dir() {
        return Err(TrimError::scan(
            root,
            io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        ));
    }
    fs::read_dir(root).map_err(|e| TrimError::scan(root, e))?;

    let mut groups: BTreeMap<PathBuf, Vec<VersionEntry>> = BTreeMap::new();
    let mut walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                warn!("skipping unreadable path {}: {}", path.display(), err);
                continue;
            }
        };
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if is_skipped_dir(&name) {
            walker.skip_current_dir();
            continue;
        }
        if !is_version_dir_name(&name) {
            continue;
        }

        if let Some(parent) = entry.path().parent() {
            groups
                .entry(parent.to_path_buf())
                .or_default()
                .push(VersionEntry::new(entry.path().to_path_buf()));
        }
        walker.skip_current_dir();
    }

    let surfaces: Vec<ApiSurface> = groups
        .into_iter()
        .map(|(path, versions)| ApiSurface {
            name: surface_name(root, &path),
            path,
            versions,
        })
        .collect();

    debug!(
        "found {} versioned API surface(s) under {}",
        surfaces.len(),
        root.display()
    );
    Ok(surfaces)
}

fn surface_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}
