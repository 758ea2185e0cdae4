//! Dependency resolver: builds the ground-truth set of shared objects a loader
//! would bring in for the executable.

use std::collections::{HashSet, VecDeque};
use std::ffi::OsString;
use std::fs;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ProvenanceError, ProvenanceResult};
use crate::model::{DedupPolicy, ForensicDescriptor, ResolvedDependency};
use crate::services::deps::{DependencySource, ResolveMode, WalkEntry};

/// Populate `descriptor.resolved` with every transitively reachable shared object.
///
/// Nodes are stored head first (most recently resolved at the front). On any
/// failure the collection is left empty: a partial set is never usable as
/// ground truth.
pub fn resolve_dependencies<S: DependencySource + ?Sized>(
    descriptor: &mut ForensicDescriptor,
    source: &S,
    dedup: DedupPolicy,
) -> ProvenanceResult<usize> {
    descriptor.resolved.clear();

    let walk = source.walk(&descriptor.exe_path, ResolveMode::Transitive).map_err(|source| {
        warn!("Dependency walk init failed for {}: {source}", descriptor.exe_path.display());
        ProvenanceError::IteratorInitFailed { exe: descriptor.exe_path.clone(), source }
    })?;

    let mut resolved = VecDeque::new();
    let mut seen = HashSet::new();
    for step in walk {
        let (path, basename) = match step {
            Ok(WalkEntry::Found { path, basename }) => (path, basename),
            Ok(WalkEntry::NotFound { name }) => {
                warn!("Dependency {name} not found; skipping");
                continue;
            }
            Err(source) => {
                warn!("Dependency walk failed: {source}");
                return Err(ProvenanceError::IteratorStepFailed { source });
            }
        };

        let path = canonicalize_entry(&path)?;
        if dedup == DedupPolicy::Collapse && !seen.insert(path.clone()) {
            debug!("Skipping repeated dependency {}", path.display());
            continue;
        }
        debug!("Transitive DT_NEEDED insertion: {}", path.display());
        resolved.push_front(ResolvedDependency { path, basename });
    }

    info!(
        "Resolved {} dependencies for {}",
        resolved.len(),
        descriptor.exe_path.display()
    );
    let count = resolved.len();
    descriptor.resolved = resolved;
    Ok(count)
}

/// Rebuild a symlinked entry as its own directory joined with the link target.
///
/// Entries that are not symlinks (or cannot be read as links) are kept verbatim.
/// An absolute link target replaces the path outright.
pub fn canonicalize_entry(path: &Path) -> ProvenanceResult<PathBuf> {
    let Ok(target) = fs::read_link(path) else {
        return Ok(path.to_path_buf());
    };
    if target.is_absolute() {
        return Ok(target);
    }

    let raw = path.as_os_str().as_bytes();
    let sep = raw
        .iter()
        .rposition(|b| *b == b'/')
        .ok_or_else(|| ProvenanceError::PathNormalizationFailed { path: path.to_path_buf() })?;

    let mut rebuilt = raw[..=sep].to_vec();
    rebuilt.extend_from_slice(target.as_os_str().as_bytes());
    Ok(PathBuf::from(OsString::from_vec(rebuilt)))
}
