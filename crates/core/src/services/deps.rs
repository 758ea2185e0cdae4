//! Interface to the dependency-walking collaborator.
//!
//! A [`DependencySource`] starts a walk for one executable and hands back an
//! iterator of [`WalkEntry`] steps:
//! - `walk(..)` returning `Err` means the walk could not be initialized.
//! - `Some(Ok(Found { .. }))` is one reachable shared object.
//! - `Some(Ok(NotFound { .. }))` is a declared dependency that could not be located.
//! - `Some(Err(..))` is a mid-stream failure.
//! - `None` ends the walk.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How far the walk follows `DT_NEEDED` edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    /// Only the executable's own dependencies.
    Direct,
    /// Dependencies of dependencies, recursively.
    Transitive,
}

/// One step of a dependency walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEntry {
    Found { path: PathBuf, basename: String },
    NotFound { name: String },
}

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("Failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse ELF object {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: goblin::error::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Boxed iterator of walk steps returned by a [`DependencySource`].
pub type DependencyWalk<'a> = Box<dyn Iterator<Item = Result<WalkEntry, WalkError>> + 'a>;

/// Collaborator that knows how a loader would locate an executable's dependencies.
pub trait DependencySource {
    fn walk<'a>(&'a self, exe: &Path, mode: ResolveMode) -> Result<DependencyWalk<'a>, WalkError>;
}
