//! provenance-core
//!
//! Core library classifying every shared-library mapping of a captured process
//! image as legitimately linked, loaded at runtime through `dlopen`, or injected.
//!
//! The heuristic lives in [`analysis`]; the collaborators it consumes
//! (dependency walking, core-file notes, mapped images) live in [`services`]
//! behind small interfaces so they can be swapped in tests. Classification
//! runs can be persisted through [`db`].
//!
//! All substantive logic lives here so it is fully testable and reusable from
//! multiple frontends.

pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod services;

pub use error::{ProvenanceError, ProvenanceResult};

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
