use std::fmt;
use std::path::PathBuf;

use bytesize::ByteSize;
use serde::Serialize;

use crate::types::Retention;

#[derive(Debug, Clone, Serialize)]
pub struct KeptVersion {
    pub name: String,
    #[serde(flatten)]
    pub retention: Retention,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedVersion {
    pub name: String,
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SurfaceReport {
    pub name: String,
    pub path: PathBuf,
    pub kept: Vec<KeptVersion>,
    pub deleted: Vec<DeletedVersion>,
    pub bytes_freed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub path: PathBuf,
    pub error: String,
    /// Bytes already gone when the removal stopped part way.
    pub bytes_freed: u64,
}

/// Outcome of a run. In dry-run mode `deleted` and `bytes_freed` describe
/// what would have been removed.
#[derive(Debug, Clone, Serialize)]
pub struct TrimReport {
    pub root: PathBuf,
    pub dry_run: bool,
    pub files_scanned: usize,
    pub surfaces: Vec<SurfaceReport>,
    pub failures: Vec<Failure>,
    pub versions_kept: usize,
    pub versions_deleted: usize,
    pub bytes_freed: u64,
}

impl TrimReport {
    pub fn new(root: PathBuf, dry_run: bool, files_scanned: usize) -> Self {
        TrimReport {
            root,
            dry_run,
            files_scanned,
            surfaces: Vec::new(),
            failures: Vec::new(),
            versions_kept: 0,
            versions_deleted: 0,
            bytes_freed: 0,
        }
    }

    pub fn push(&mut self, surface: SurfaceReport) {
        self.versions_kept += surface.kept.len();
        self.versions_deleted += surface.deleted.len();
        self.bytes_freed += surface.bytes_freed;
        self.surfaces.push(surface);
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for TrimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (deleted, freed) = if self.dry_run {
            ("Would delete", "Would free")
        } else {
            ("Deleted", "Freed")
        };

        writeln!(f, "{}", self.root.display())?;
        for surface in self.surfaces.iter().filter(|s| !s.deleted.is_empty()) {
            writeln!(
                f,
                "  {}: {} {} of {} version(s) ({})",
                surface.name,
                deleted.to_lowercase(),
                surface.deleted.len(),
                surface.deleted.len() + surface.kept.len(),
                ByteSize::b(surface.bytes_freed)
            )?;
        }
        writeln!(f, "  API surfaces:      {}", self.surfaces.len())?;
        writeln!(f, "  Versions kept:     {}", self.versions_kept)?;
        writeln!(f, "  {:<18} {}", format!("{}:", deleted), self.versions_deleted)?;
        writeln!(
            f,
            "  {:<18} {}",
            format!("{}:", freed),
            ByteSize::b(self.bytes_freed)
        )?;
        if !self.failures.is_empty() {
            writeln!(f, "  Failed removals:   {}", self.failures.len())?;
            for failure in &self.failures {
                writeln!(f, "    {}: {}", failure.path.display(), failure.error)?;
            }
        }
        if self.dry_run {
            writeln!(f, "\nThis was a dry run. No directories were deleted.")?;
        }
        Ok(())
    }
}
