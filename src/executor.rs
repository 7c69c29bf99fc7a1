use std::fs;
use std::io;
use std::path::Path;

use bytesize::ByteSize;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, TrimError};
use crate::report::{DeletedVersion, Failure, KeptVersion, SurfaceReport, TrimReport};
use crate::types::{ApiSurface, Retention, TrimOptions};

/// Apparent size of everything under `path`, without following symlinks.
///
/// Entries that cannot be read are left out of the total.
pub fn directory_size(path: &Path) -> Result<u64> {
    fs::symlink_metadata(path).map_err(|e| TrimError::io(path, e))?;

    let mut total = 0;
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("not counting unreadable entry: {}", err);
                continue;
            }
        };
        if entry.file_type().is_file() {
            match entry.metadata() {
                Ok(metadata) => total += metadata.len(),
                Err(err) => debug!("no metadata for {}: {}", entry.path().display(), err),
            }
        }
    }
    Ok(total)
}

/// Remove every entry marked [`Retention::Delete`].
///
/// A failure on one directory is recorded in the report and the run goes on.
/// A directory that is already gone counts as removed. With `options.dry_run`
/// nothing is touched and sizes describe what would go.
pub fn execute(surfaces: &[ApiSurface], options: &TrimOptions, files_scanned: usize) -> TrimReport {
    let mut report = TrimReport::new(options.root.clone(), options.dry_run, files_scanned);

    for surface in surfaces {
        let mut kept = Vec::new();
        let mut deleted = Vec::new();
        let mut bytes_freed = 0;

        for entry in &surface.versions {
            match &entry.retention {
                Some(Retention::Delete) => {}
                Some(retention) => {
                    kept.push(KeptVersion {
                        name: entry.name.clone(),
                        retention: retention.clone(),
                    });
                    continue;
                }
                None => {
                    warn!("{} was never classified, leaving it", entry.path.display());
                    continue;
                }
            }

            let bytes = directory_size(&entry.path).unwrap_or_else(|err| {
                warn!("cannot measure {}: {}", entry.path.display(), err);
                0
            });

            if options.dry_run {
                info!(
                    "would remove {} ({})",
                    entry.path.display(),
                    ByteSize::b(bytes)
                );
            } else if let Err(source) = fs::remove_dir_all(&entry.path)
                && source.kind() != io::ErrorKind::NotFound
            {
                let err = TrimError::remove(&entry.path, source);
                // part of the tree may already be gone
                let remaining = directory_size(&entry.path).unwrap_or(bytes);
                let partial = bytes.saturating_sub(remaining);
                bytes_freed += partial;
                error!("{}", err);
                report.failures.push(Failure {
                    path: entry.path.clone(),
                    error: if partial > 0 {
                        format!("{} (partially removed, {} freed)", err, ByteSize::b(partial))
                    } else {
                        err.to_string()
                    },
                    bytes_freed: partial,
                });
                continue;
            } else {
                info!("removed {} ({})", entry.path.display(), ByteSize::b(bytes));
            }

            bytes_freed += bytes;
            deleted.push(DeletedVersion {
                name: entry.name.clone(),
                path: entry.path.clone(),
                bytes,
            });
        }

        if !deleted.is_empty() {
            debug!(
                "{}: {} {} version(s), {}",
                surface.name,
                if options.dry_run { "would drop" } else { "dropped" },
                deleted.len(),
                ByteSize::b(bytes_freed)
            );
        }

        report.push(SurfaceReport {
            name: surface.name.clone(),
            path: surface.path.clone(),
            kept,
            deleted,
            bytes_freed,
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VersionEntry;
    use tempfile::TempDir;

    fn write(path: &Path, len: usize) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![b'x'; len]).unwrap();
    }

    fn surface_with(root: &Path, marks: &[(&str, Retention)]) -> ApiSurface {
        let path = root.join("api");
        ApiSurface {
            name: "api".to_string(),
            versions: marks
                .iter()
                .map(|(name, retention)| {
                    let mut entry = VersionEntry::new(path.join(name));
                    entry.retention = Some(retention.clone());
                    entry
                })
                .collect(),
            path,
        }
    }

    #[test]
    fn test_directory_size() {
        let td = TempDir::new().unwrap();
        write(&td.path().join("v1/a.py"), 100);
        write(&td.path().join("v1/sub/b.py"), 50);
        assert_eq!(directory_size(&td.path().join("v1")).unwrap(), 150);
        assert!(directory_size(&td.path().join("missing")).is_err());
    }

    #[test]
    fn test_execute_removes_only_marked() {
        let td = TempDir::new().unwrap();
        write(&td.path().join("api/v1/models.py"), 10);
        write(&td.path().join("api/v2/models.py"), 20);
        write(&td.path().join("api/v3/models.py"), 30);
        let surface = surface_with(
            td.path(),
            &[
                ("v3", Retention::Newest),
                ("v2", Retention::Delete),
                ("v1", Retention::Delete),
            ],
        );

        let report = execute(&[surface], &TrimOptions::new(td.path()), 0);
        assert!(report.is_success());
        assert_eq!(report.versions_deleted, 2);
        assert_eq!(report.bytes_freed, 30);
        assert!(td.path().join("api/v3").exists());
        assert!(!td.path().join("api/v2").exists());
        assert!(!td.path().join("api/v1").exists());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let td = TempDir::new().unwrap();
        write(&td.path().join("api/v1/models.py"), 10);
        write(&td.path().join("api/v2/models.py"), 20);
        let surface = surface_with(
            td.path(),
            &[("v2", Retention::Newest), ("v1", Retention::Delete)],
        );

        let report = execute(&[surface], &TrimOptions::new(td.path()).dry_run(true), 0);
        assert!(report.dry_run);
        assert_eq!(report.versions_deleted, 1);
        assert_eq!(report.bytes_freed, 10);
        assert!(td.path().join("api/v1/models.py").exists());
    }

    #[test]
    fn test_failure_is_recorded_and_run_continues() {
        let td = TempDir::new().unwrap();
        write(&td.path().join("api/v1/models.py"), 10);
        // not a directory, so remove_dir_all refuses it
        write(&td.path().join("api/v2"), 5);
        let surface = surface_with(
            td.path(),
            &[
                ("v3", Retention::Newest),
                ("v2", Retention::Delete),
                ("v1", Retention::Delete),
            ],
        );

        let report = execute(&[surface], &TrimOptions::new(td.path()), 0);
        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("api/v2"));
        assert_eq!(report.versions_deleted, 1);
        assert_eq!(report.bytes_freed, 10);
        assert!(!td.path().join("api/v1").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_partial_removal_counts_what_is_gone() {
        use std::os::unix::fs::PermissionsExt;

        let td = TempDir::new().unwrap();
        write(&td.path().join("api/v1/a.py"), 100);
        write(&td.path().join("api/v1/b.py"), 100);
        write(&td.path().join("api/v1/locked/c.py"), 10);
        write(&td.path().join("api/v2/models.py"), 1);
        let locked = td.path().join("api/v1/locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
        if fs::write(locked.join("writable"), "").is_ok() {
            // permissions are not enforced (running as root)
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let surface = surface_with(
            td.path(),
            &[("v2", Retention::Newest), ("v1", Retention::Delete)],
        );
        let report = execute(&[surface], &TrimOptions::new(td.path()), 0);
        let remaining = directory_size(&td.path().join("api/v1")).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.versions_deleted, 0);
        assert!(remaining >= 10);
        assert_eq!(report.failures[0].bytes_freed, 210 - remaining);
        assert_eq!(report.bytes_freed, 210 - remaining);
        if remaining < 210 {
            assert!(report.failures[0].error.contains("partially removed"));
        }
    }

    #[test]
    fn test_unclassified_entries_are_left_alone() {
        let td = TempDir::new().unwrap();
        write(&td.path().join("api/v1/models.py"), 10);
        let path = td.path().join("api");
        let surface = ApiSurface {
            name: "api".to_string(),
            versions: vec![VersionEntry::new(path.join("v1"))],
            path,
        };

        let report = execute(&[surface], &TrimOptions::new(td.path()), 0);
        assert_eq!(report.versions_kept, 0);
        assert_eq!(report.versions_deleted, 0);
        assert!(td.path().join("api/v1/models.py").exists());
    }

    #[test]
    fn test_already_removed_is_not_a_failure() {
        let td = TempDir::new().unwrap();
        fs::create_dir_all(td.path().join("api/v2")).unwrap();
        let surface = surface_with(
            td.path(),
            &[("v2", Retention::Newest), ("v1", Retention::Delete)],
        );

        let report = execute(&[surface], &TrimOptions::new(td.path()), 0);
        assert!(report.is_success());
        assert_eq!(report.versions_deleted, 1);
        assert_eq!(report.bytes_freed, 0);
    }
}
