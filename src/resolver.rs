use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::types::{ApiSurface, ReferenceEdge, Retention, TrimOptions};

/// Settle every classified entry into kept or deleted.
///
/// Deletion candidates are the non-newest parsed entries; a candidate survives
/// if it has an incoming [`ReferenceEdge`] or its surface is keep-listed. The
/// first edge (in sorted order) is the one recorded as the reason.
pub fn resolve(surfaces: &mut [ApiSurface], edges: &[ReferenceEdge], options: &TrimOptions) {
    let mut referenced: HashMap<&Path, &ReferenceEdge> = HashMap::new();
    for edge in edges {
        referenced.entry(edge.version.as_path()).or_insert(edge);
    }

    for surface in surfaces.iter_mut() {
        let kept_surface = options.is_kept(&surface.path);
        if kept_surface {
            info!("{}: on the keep list, leaving all versions", surface.name);
        }

        for entry in surface.versions.iter_mut() {
            if entry.retention != Some(Retention::Delete) {
                continue;
            }
            if kept_surface || options.is_kept(&entry.path) {
                entry.retention = Some(Retention::KeepList);
            } else if let Some(edge) = referenced.get(entry.path.as_path()) {
                debug!(
                    "{}: keeping {} (imported by {}:{})",
                    surface.name,
                    entry.name,
                    edge.from.display(),
                    edge.line
                );
                entry.retention = Some(Retention::Referenced {
                    by: edge.from.clone(),
                    line: edge.line,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::types::VersionEntry;
    use std::path::PathBuf;

    fn surface(root: &Path, name: &str, versions: &[&str]) -> ApiSurface {
        let path = root.join(name);
        let mut surface = ApiSurface {
            name: name.to_string(),
            versions: versions
                .iter()
                .map(|v| VersionEntry::new(path.join(v)))
                .collect(),
            path,
        };
        classify(&mut surface);
        surface
    }

    fn deleted(surface: &ApiSurface) -> Vec<&str> {
        surface.delete_set().map(|v| v.name.as_str()).collect()
    }

    fn edge(from: &str, version: &Path) -> ReferenceEdge {
        ReferenceEdge {
            from: PathBuf::from(from),
            line: 1,
            version: version.to_path_buf(),
        }
    }

    const DATES: &[&str] = &["2021-01-01", "2022-06-01", "2023-09-01"];

    #[test]
    fn test_no_references_deletes_all_but_newest() {
        let root = Path::new("/sdk");
        let mut surfaces = vec![surface(root, "api", DATES)];
        resolve(&mut surfaces, &[], &TrimOptions::new(root));
        assert_eq!(deleted(&surfaces[0]), ["2022-06-01", "2021-01-01"]);
        assert_eq!(surfaces[0].newest().unwrap().name, "2023-09-01");
    }

    #[test]
    fn test_reference_rescues_old_version() {
        let root = Path::new("/sdk");
        let mut surfaces = vec![surface(root, "api", DATES)];
        let edges = [edge("/sdk/api/2023-09-01/client.py", &root.join("api/2021-01-01"))];
        resolve(&mut surfaces, &edges, &TrimOptions::new(root));

        assert_eq!(deleted(&surfaces[0]), ["2022-06-01"]);
        let rescued = &surfaces[0].versions[2];
        assert_eq!(
            rescued.retention,
            Some(Retention::Referenced {
                by: PathBuf::from("/sdk/api/2023-09-01/client.py"),
                line: 1
            })
        );
    }

    #[test]
    fn test_keep_list_surface_is_untouched() {
        let root = Path::new("/sdk");
        let mut surfaces = vec![
            surface(root, "mgmt/network", &["v1", "v2"]),
            surface(root, "mgmt/compute", &["v1", "v2"]),
        ];
        resolve(&mut surfaces, &[], &TrimOptions::new(root).keep(["network"]));

        assert!(deleted(&surfaces[0]).is_empty());
        assert_eq!(surfaces[0].versions[1].retention, Some(Retention::KeepList));
        assert_eq!(deleted(&surfaces[1]), ["v1"]);
    }

    #[test]
    fn test_newest_and_references_never_deleted() {
        let root = Path::new("/sdk");
        let names = ["v1", "v2", "v3", "v4", "v5"];
        let mut surfaces = vec![surface(root, "api", &names)];
        let edges: Vec<_> = ["v1", "v3", "v5"]
            .iter()
            .map(|v| edge("/sdk/other.py", &root.join("api").join(v)))
            .collect();
        resolve(&mut surfaces, &edges, &TrimOptions::new(root));

        let newest = surfaces[0].newest().unwrap().path.clone();
        for doomed in surfaces[0].delete_set() {
            assert_ne!(doomed.path, newest);
            assert!(edges.iter().all(|e| e.version != doomed.path));
        }
        assert_eq!(deleted(&surfaces[0]), ["v4", "v2"]);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let root = Path::new("/sdk");
        let edges = [edge("/sdk/a.py", &root.join("api/2022-06-01"))];
        let run = || {
            let mut surfaces = vec![surface(root, "api", DATES)];
            resolve(&mut surfaces, &edges, &TrimOptions::new(root));
            deleted(&surfaces[0])
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
        assert_eq!(run(), ["2021-01-01"]);
    }
}
