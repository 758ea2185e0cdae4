//! Core data model for one analyzed process artifact.
//!
//! - [`ForensicDescriptor`]: the executable/core pair under analysis plus the
//!   dependency set resolved for it.
//! - [`ResolvedDependency`]: one transitively reachable shared object.
//! - [`LibraryMapping`]: one shared-library mapping recorded in the core image,
//!   carrying the two provenance flags the classifier sets.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Provenance class of a mapped shared library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Reachable through transitive `DT_NEEDED` resolution.
    Linked,
    /// Absent from the dependency graph, but the executable imports `dlopen`.
    Dlopened,
    /// Absent from the dependency graph and the executable cannot `dlopen`.
    Injected,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Linked => "linked",
            Provenance::Dlopened => "dlopened",
            Provenance::Injected => "injected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "linked" => Some(Provenance::Linked),
            "dlopened" => Some(Provenance::Dlopened),
            "injected" => Some(Provenance::Injected),
            _ => None,
        }
    }
}

/// How repeated resolutions of the same path are stored.
///
/// A library reachable along several edges of the dependency graph (a diamond)
/// is yielded once per edge by the dependency walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Keep one node per yielded entry, duplicates included.
    #[default]
    Preserve,
    /// Keep only the first node resolved for a given path.
    Collapse,
}

/// One shared object reachable from the executable's declared dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDependency {
    /// Canonical path (symlinks rebuilt against the entry's directory).
    pub path: PathBuf,
    /// File name as reported by the dependency walk.
    pub basename: String,
}

/// The artifact under analysis: a core image plus the executable it was taken from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForensicDescriptor {
    /// Path of the original executable on disk.
    pub exe_path: PathBuf,
    /// Path of the captured core image, when one backs this descriptor.
    pub core_path: Option<PathBuf>,
    /// Resolved dependencies, most recently resolved first.
    #[serde(default)]
    pub resolved: VecDeque<ResolvedDependency>,
}

impl ForensicDescriptor {
    pub fn new(exe_path: impl Into<PathBuf>) -> Self {
        Self { exe_path: exe_path.into(), core_path: None, resolved: VecDeque::new() }
    }

    pub fn with_core(mut self, core_path: impl Into<PathBuf>) -> Self {
        self.core_path = Some(core_path.into());
        self
    }

    pub fn exe_path(&self) -> &Path {
        &self.exe_path
    }

    /// Resolved paths in collection order (head first).
    pub fn resolved_paths(&self) -> impl Iterator<Item = &Path> {
        self.resolved.iter().map(|dep| dep.path.as_path())
    }
}

/// A shared-library mapping found in the core image's memory-map metadata.
///
/// `injected` and `dlopen` are never both set; both clear means the mapping
/// was verified as a transitive dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryMapping {
    pub path: PathBuf,
    #[serde(default)]
    pub injected: bool,
    #[serde(default)]
    pub dlopen: bool,
}

impl LibraryMapping {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), injected: false, dlopen: false }
    }

    /// Derive the three-valued class from the two flags.
    pub fn provenance(&self) -> Provenance {
        match (self.injected, self.dlopen) {
            (true, _) => Provenance::Injected,
            (false, true) => Provenance::Dlopened,
            (false, false) => Provenance::Linked,
        }
    }

    /// Set both flags from a single class.
    pub fn mark(&mut self, provenance: Provenance) {
        self.injected = provenance == Provenance::Injected;
        self.dlopen = provenance == Provenance::Dlopened;
    }

    /// File-name component of the mapped path.
    pub fn basename(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }
}
