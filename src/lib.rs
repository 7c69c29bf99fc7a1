//! Trim redundant API-version directories out of a versioned SDK install.
//!
//! Large SDKs (the Azure SDK for Python being the worst offender) ship every
//! released API version of every service side by side, in folders such as
//! `v2020_11_01` or `2021-01-01`. Most of them are dead weight. This crate
//! keeps the newest version of each API surface, plus any older version that
//! retained code still imports, and deletes the rest.
//!
//! The run is a straight pipeline:
//!
//! 1. [`scanner::scan`] groups version folders by parent directory;
//! 2. [`classifier::classify`] finds the newest version of each group;
//! 3. [`references::scan_references`] reads retained code for imports of
//!    older versions;
//! 4. [`resolver::resolve`] settles the final keep/delete decision;
//! 5. [`executor::execute`] deletes (or, in dry-run mode, only measures).
//!
//! ```no_run
//! use sdk_trim::TrimOptions;
//!
//! let options = TrimOptions::new("/usr/lib/python3/site-packages/azure")
//!     .dry_run(true)
//!     .keep(["cli"]);
//! let report = sdk_trim::trim(&options)?;
//! println!("{report}");
//! # Ok::<(), sdk_trim::TrimError>(())
//! ```

use std::path::Path;

use tracing::info;

pub mod classifier;
pub mod error;
pub mod executor;
pub mod parsing;
pub mod references;
pub mod report;
pub mod resolver;
pub mod scanner;
pub mod types;

pub use error::{Result, TrimError};
pub use report::TrimReport;
pub use types::{ApiSurface, ReferenceEdge, Retention, TrimOptions, VersionEntry};

/// Every decision for a tree, before anything is deleted.
#[derive(Debug, Clone)]
pub struct Plan {
    pub surfaces: Vec<ApiSurface>,
    pub edges: Vec<ReferenceEdge>,
    pub files_scanned: usize,
}

impl Plan {
    /// Paths that [`execute`](executor::execute) would remove, in scan order.
    pub fn delete_set(&self) -> Vec<&Path> {
        self.surfaces
            .iter()
            .flat_map(|s| s.delete_set())
            .map(|v| v.path.as_path())
            .collect()
    }
}

/// Scan, classify, scan references and resolve. Touches nothing on disk.
pub fn plan(options: &TrimOptions) -> Result<Plan> {
    info!("scanning {}", options.root.display());
    let mut surfaces = scanner::scan(options)?;
    for surface in surfaces.iter_mut() {
        classifier::classify(surface);
    }

    let references = references::scan_references(&surfaces, options);
    resolver::resolve(&mut surfaces, &references.edges, options);

    Ok(Plan {
        surfaces,
        edges: references.edges,
        files_scanned: references.files_scanned,
    })
}

/// Run the whole pipeline. Honors `options.dry_run`.
pub fn trim(options: &TrimOptions) -> Result<TrimReport> {
    let plan = plan(options)?;
    let report = executor::execute(&plan.surfaces, options, plan.files_scanned);
    info!(
        "{} {} version(s) across {} API surface(s)",
        if options.dry_run {
            "would delete"
        } else {
            "deleted"
        },
        report.versions_deleted,
        report.surfaces.len()
    );
    Ok(report)
}
