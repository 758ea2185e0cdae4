use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::services::deps::WalkError;

/// Failures that abort classification of one artifact.
///
/// A skipped dependency and a missing dynamic symbol table are not errors; they
/// surface as `WalkEntry::NotFound` and `Capability::NoDynamicSymbolTable`.
#[derive(Debug, Error)]
pub enum ProvenanceError {
    #[error("Dependency walk could not start for {exe:?}")]
    IteratorInitFailed {
        exe: PathBuf,
        #[source]
        source: WalkError,
    },

    #[error("Dependency walk failed mid-stream")]
    IteratorStepFailed {
        #[source]
        source: WalkError,
    },

    /// A resolved symlink path has no directory separator to rebuild against.
    #[error("Cannot normalize resolved dependency path {path:?}: no directory component")]
    PathNormalizationFailed { path: PathBuf },

    #[error("Executable cannot be opened or mapped: {path:?}")]
    ExecutableUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Executable is not a well-formed ELF image: {path:?}: {reason}")]
    ExecutableMalformed { path: PathBuf, reason: String },

    #[error("Core image cannot be opened or mapped: {path:?}")]
    CoreUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Core image is not a well-formed ELF core: {path:?}: {reason}")]
    CoreMalformed { path: PathBuf, reason: String },

    #[error("Could not grow literal string buffer to {requested} entries")]
    StringBufferGrowthFailed { requested: usize },
}

pub type ProvenanceResult<T> = Result<T, ProvenanceError>;
