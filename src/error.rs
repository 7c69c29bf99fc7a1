use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while trimming an SDK tree.
#[derive(Error, Debug)]
pub enum TrimError {
    /// The scan root is missing or unreadable. Aborts the run.
    #[error("cannot scan `{}`: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A single version directory could not be removed.
    #[error("failed to remove `{}`: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TrimError {
    pub fn scan(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Scan {
            path: path.into(),
            source,
        }
    }

    pub fn remove(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Remove {
            path: path.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Scan { .. })
    }
}

pub type Result<T> = std::result::Result<T, TrimError>;
