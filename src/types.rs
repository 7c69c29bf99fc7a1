use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::parsing::{VersionId, parse_version_id};

pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &["py", "pyi"];

/// Why a version directory is kept, or that it is going away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Retention {
    Newest,
    Referenced { by: PathBuf, line: usize },
    /// The name could not be parsed, so there is no safe ordering for it.
    Unparsed,
    KeepList,
    Delete,
}

impl Retention {
    pub fn is_retained(&self) -> bool {
        !matches!(self, Retention::Delete)
    }
}

#[derive(Debug, Clone)]
pub struct VersionEntry {
    pub name: String,
    pub id: VersionId,
    pub path: PathBuf,
    /// `None` until the surface has been classified.
    pub retention: Option<Retention>,
}

impl VersionEntry {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id = parse_version_id(&name);
        VersionEntry {
            name,
            id,
            path,
            retention: None,
        }
    }
}

/// Sibling version directories sharing one parent directory.
#[derive(Debug, Clone)]
pub struct ApiSurface {
    /// Parent path relative to the scan root, `/` separated.
    pub name: String,
    pub path: PathBuf,
    /// Newest first once classified.
    pub versions: Vec<VersionEntry>,
}

impl ApiSurface {
    pub fn newest(&self) -> Option<&VersionEntry> {
        self.versions
            .iter()
            .find(|v| v.retention == Some(Retention::Newest))
    }

    pub fn delete_set(&self) -> impl Iterator<Item = &VersionEntry> {
        self.versions
            .iter()
            .filter(|v| v.retention == Some(Retention::Delete))
    }
}

/// A retained file importing a version directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReferenceEdge {
    pub from: PathBuf,
    pub line: usize,
    pub version: PathBuf,
}

/// Run configuration shared by every stage of the pipeline.
#[derive(Debug, Clone)]
pub struct TrimOptions {
    pub root: PathBuf,
    pub dry_run: bool,
    /// Directory names (or root-relative paths) that are never trimmed.
    pub keep: Vec<String>,
    pub source_extensions: Vec<String>,
}

impl TrimOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        TrimOptions {
            root: root.into(),
            dry_run: false,
            keep: Vec::new(),
            source_extensions: DEFAULT_SOURCE_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn keep<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keep.extend(names.into_iter().map(Into::into));
        self
    }

    /// True if `path` sits at or below a keep-listed directory.
    ///
    /// A keep entry without a `/` matches any path component by name, so
    /// `network` protects `mgmt/network` as well as `cli/vendored/network`.
    /// An entry with a `/` is matched as a path under the root.
    pub fn is_kept(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        self.keep.iter().any(|keep| {
            let keep = keep.trim_matches('/');
            if keep.is_empty() {
                false
            } else if keep.contains('/') {
                relative.starts_with(keep)
            } else {
                relative.components().any(|c| c.as_os_str() == keep)
            }
        })
    }

    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.source_extensions
                    .iter()
                    .any(|want| want.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
    }
}
