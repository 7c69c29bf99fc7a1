use std::cmp::Ordering;
use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::parsing::VersionKind;
use crate::types::{ApiSurface, Retention, VersionEntry};

/// Order a surface newest first and mark the entry that is always kept.
///
/// Opaque names are pushed to the end and marked [`Retention::Unparsed`].
/// Everything else is left as a deletion candidate ([`Retention::Delete`]),
/// to be rescued later by references or the keep list.
pub fn classify(surface: &mut ApiSurface) {
    let (mut ranked, mut unparsed): (Vec<VersionEntry>, Vec<VersionEntry>) = surface
        .versions
        .drain(..)
        .partition(|v| !v.id.is_opaque());

    let kinds: BTreeSet<_> = ranked.iter().map(|v| v.id.kind()).collect();
    let sequences_only = kinds
        .iter()
        .all(|k| matches!(k, VersionKind::Semver | VersionKind::Numeric));
    if kinds.len() > 1 && sequences_only {
        ranked.sort_by(newest_sequence_first);
    } else if kinds.len() > 1 {
        warn!(
            "{}: mixed version naming ({}), falling back to name order",
            surface.name,
            ranked
                .iter()
                .map(|v| v.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        ranked.sort_by(|a, b| b.name.cmp(&a.name));
    } else {
        ranked.sort_by(newest_first);
    }

    for (idx, entry) in ranked.iter_mut().enumerate() {
        entry.retention = Some(if idx == 0 {
            Retention::Newest
        } else {
            Retention::Delete
        });
    }

    for entry in unparsed.iter_mut() {
        warn!(
            "{}: cannot parse version `{}`, keeping it",
            surface.name, entry.name
        );
        entry.retention = Some(Retention::Unparsed);
    }

    if let Some(newest) = ranked.first() {
        debug!("{}: newest version is {}", surface.name, newest.name);
    }

    surface.versions = ranked;
    surface.versions.extend(unparsed);
}

/// Descending by value, with the directory name as the tie-break so
/// `v7` and `v7_0` still order deterministically.
fn newest_first(a: &VersionEntry, b: &VersionEntry) -> Ordering {
    b.id.cmp_value(&a.id)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.name.cmp(&a.name))
}

/// Like [`newest_first`], for a surface mixing semver and numeric names.
fn newest_sequence_first(a: &VersionEntry, b: &VersionEntry) -> Ordering {
    b.id.cmp_sequence(&a.id)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.name.cmp(&a.name))
}
