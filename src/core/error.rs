//! Error taxonomy for the menu model
//!
//! Strategy inapplicability is NOT an error (see `core::mover::MoveOutcome`);
//! this enum covers real failures: missing objects, exhausted move targets,
//! broken invariants and failing external commands.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A rule, entry, script or proxy lookup came up empty.
    #[error("not found: {0}")]
    NotFound(String),

    /// Every move strategy declined the requested move.
    #[error("no move target: the rule is already at the boundary")]
    NoMoveTarget,

    /// An internal invariant was violated; this is a bug, never user error.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// The menu config generator exited non-zero.
    #[error("config generator failed:\n{output}")]
    GeneratorFailed { output: String },

    /// The install command exited non-zero.
    #[error("install command failed:\n{output}")]
    InstallFailed { output: String },

    /// A load worker is already running on this menu.
    #[error("a load is already in progress")]
    AlreadyLoading,

    /// Configuration could not be read or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem trouble, annotated with the path when known.
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
