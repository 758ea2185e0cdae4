use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::probe::{probe_dlopen, Capability};
use crate::analysis::resolver::resolve_dependencies;
use crate::error::ProvenanceResult;
use crate::model::{DedupPolicy, ForensicDescriptor, LibraryMapping, Provenance};
use crate::services::deps::DependencySource;

/// What to do when the executable cannot be probed for `dlopen`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeFailurePolicy {
    /// Fail the artifact; no mapping is touched.
    #[default]
    Abort,
    /// Log the failure and classify as if `dlopen` were not imported.
    AssumeAbsent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifyOptions {
    pub dedup: DedupPolicy,
    pub on_probe_failure: ProbeFailurePolicy,
    pub corroborate_literals: bool,
}

/// Counts produced by one classification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    pub linked: usize,
    pub dlopened: usize,
    pub injected: usize,
    pub dlopen_capable: bool,
    pub resolved: usize,
}

impl ClassificationSummary {
    /// True when at least one mapping is outside the dependency graph.
    pub fn has_anomalies(&self) -> bool {
        self.dlopened + self.injected > 0
    }
}

/// Mark every mapping against an already resolved descriptor.
///
/// Each mapping is visited exactly once and both flags are rewritten, so a
/// second pass over the same inputs yields the same flags.
pub fn apply_classification(
    descriptor: &ForensicDescriptor,
    mappings: &mut [LibraryMapping],
    dlopen_capable: bool,
) -> ClassificationSummary {
    let mut summary = ClassificationSummary {
        dlopen_capable,
        resolved: descriptor.resolved.len(),
        ..Default::default()
    };

    for mapping in mappings.iter_mut() {
        let provenance = if descriptor.is_resolved(&mapping.path) {
            summary.linked += 1;
            Provenance::Linked
        } else if dlopen_capable {
            summary.dlopened += 1;
            Provenance::Dlopened
        } else {
            summary.injected += 1;
            Provenance::Injected
        };
        debug!("{} -> {}", mapping.path.display(), provenance.as_str());
        mapping.mark(provenance);
    }
    summary
}

/// Resolve, probe once, then classify every mapping.
pub fn classify_mappings<S: DependencySource + ?Sized>(
    descriptor: &mut ForensicDescriptor,
    mappings: &mut [LibraryMapping],
    source: &S,
    options: &ClassifyOptions,
) -> ProvenanceResult<ClassificationSummary> {
    classify_mappings_with(descriptor, mappings, source, options, probe_dlopen)
}

/// Same as [`classify_mappings`] with a caller-supplied capability probe.
///
/// Mappings are only mutated after both resolution and the probe have
/// settled; any failure returned here leaves them untouched.
pub fn classify_mappings_with<S, P>(
    descriptor: &mut ForensicDescriptor,
    mappings: &mut [LibraryMapping],
    source: &S,
    options: &ClassifyOptions,
    probe: P,
) -> ProvenanceResult<ClassificationSummary>
where
    S: DependencySource + ?Sized,
    P: FnOnce(&Path) -> ProvenanceResult<Capability>,
{
    resolve_dependencies(descriptor, source, options.dedup)?;

    let dlopen_capable = match probe(&descriptor.exe_path) {
        Ok(capability) => capability.is_present(),
        Err(err) if options.on_probe_failure == ProbeFailurePolicy::AssumeAbsent => {
            warn!("Capability probe failed, assuming no dlopen: {err}");
            false
        }
        Err(err) => return Err(err),
    };

    let summary = apply_classification(descriptor, mappings, dlopen_capable);
    info!(
        "Classified {} mappings for {}: {} linked, {} dlopened, {} injected",
        mappings.len(),
        descriptor.exe_path.display(),
        summary.linked,
        summary.dlopened,
        summary.injected
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::model::ResolvedDependency;

    fn resolved(paths: &[&str]) -> ForensicDescriptor {
        let mut descriptor = ForensicDescriptor::new("/usr/bin/app");
        for path in paths {
            descriptor.resolved.push_front(ResolvedDependency {
                path: PathBuf::from(path),
                basename: String::new(),
            });
        }
        descriptor
    }

    #[test]
    fn unresolved_mapping_follows_capability() {
        let descriptor = resolved(&["/lib/libc.so.6"]);
        let mut mappings =
            vec![LibraryMapping::new("/lib/libc.so.6"), LibraryMapping::new("/opt/libx.so")];

        let summary = apply_classification(&descriptor, &mut mappings, true);
        assert_eq!(mappings[1].provenance(), Provenance::Dlopened);
        assert_eq!((summary.linked, summary.dlopened, summary.injected), (1, 1, 0));

        let summary = apply_classification(&descriptor, &mut mappings, false);
        assert_eq!(mappings[1].provenance(), Provenance::Injected);
        assert!(!mappings[1].dlopen);
        assert_eq!(mappings[0].provenance(), Provenance::Linked);
        assert!(summary.has_anomalies());
    }

    #[test]
    fn empty_mapping_list_is_not_anomalous() {
        let descriptor = resolved(&[]);
        let summary = apply_classification(&descriptor, &mut [], false);
        assert!(!summary.has_anomalies());
    }
}
