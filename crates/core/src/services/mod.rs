//! Collaborators consumed by the classification heuristic.
//!
//! - [`deps`]: the dependency-walk interface.
//! - [`loader`]: default walk emulating the glibc loader search.
//! - [`corefile`]: `NT_FILE` mapping extraction from core images.
//! - [`image`]: read-only memory-mapped ELF images.

pub mod corefile;
pub mod deps;
pub mod image;
pub mod loader;

pub use deps::{DependencySource, DependencyWalk, ResolveMode, WalkEntry, WalkError};
pub use loader::LoaderSearch;
