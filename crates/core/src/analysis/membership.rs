use std::path::Path;

use crate::model::{ForensicDescriptor, ResolvedDependency};

/// Exact match of `candidate` against the resolved paths.
///
/// No normalization happens here; both sides are already canonical.
pub fn contains_path<'a, I>(resolved: I, candidate: &Path) -> bool
where
    I: IntoIterator<Item = &'a ResolvedDependency>,
{
    resolved.into_iter().any(|dep| dep.path.as_os_str() == candidate.as_os_str())
}

impl ForensicDescriptor {
    /// Whether `candidate` is part of the resolved dependency set.
    pub fn is_resolved(&self, candidate: &Path) -> bool {
        contains_path(&self.resolved, candidate)
    }
}
