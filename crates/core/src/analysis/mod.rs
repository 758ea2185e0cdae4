//! Provenance classification of mapped shared libraries.
//!
//! A pass over one artifact:
//! - [`resolver`] builds the set of libraries the loader would bring in.
//! - [`probe`] checks once whether the executable imports `dlopen`.
//! - [`membership`] tests each mapped path against the resolved set.
//! - [`classifier`] combines the three into `Linked`/`Dlopened`/`Injected`.
//! - [`literals`] optionally corroborates non-linked verdicts with `.rodata` strings.

pub mod classifier;
pub mod literals;
pub mod membership;
pub mod probe;
pub mod resolver;

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use classifier::{
    apply_classification, classify_mappings, classify_mappings_with, ClassificationSummary,
    ClassifyOptions, ProbeFailurePolicy,
};
pub use literals::{literal_references, rodata_literals, scan_library_literals};
pub use membership::contains_path;
pub use probe::{probe_dlopen, probe_dynamic_symbol, Capability};
pub use resolver::{canonicalize_entry, resolve_dependencies};

use crate::error::ProvenanceResult;
use crate::model::{ForensicDescriptor, LibraryMapping, Provenance};
use crate::services::corefile::load_library_mappings;
use crate::services::deps::DependencySource;

/// Where an artifact's mapped-library list comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingInput {
    /// Read `NT_FILE` from a core image.
    Core(PathBuf),
    /// Paths already extracted by the analyst.
    Listed(Vec<PathBuf>),
}

/// One process artifact queued for classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInput {
    pub exe_path: PathBuf,
    pub mappings: MappingInput,
}

impl ArtifactInput {
    pub fn core_path(&self) -> Option<&Path> {
        match &self.mappings {
            MappingInput::Core(core) => Some(core),
            MappingInput::Listed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryVerdict {
    pub path: PathBuf,
    pub provenance: Provenance,
    /// Set only when literal corroboration ran and the verdict is not `Linked`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal_reference: Option<bool>,
}

/// Result of one successful classification pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReport {
    pub exe_path: PathBuf,
    pub core_path: Option<PathBuf>,
    pub dlopen_capable: bool,
    /// Resolved dependency paths, head first.
    pub resolved: Vec<PathBuf>,
    pub libraries: Vec<LibraryVerdict>,
    pub summary: ClassificationSummary,
    pub analyzed_at: String,
}

impl ArtifactReport {
    pub fn anomalies(&self) -> impl Iterator<Item = &LibraryVerdict> {
        self.libraries.iter().filter(|lib| lib.provenance != Provenance::Linked)
    }
}

/// Per-artifact outcome of a batch; a failure is never folded into "no anomalies".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactOutcome {
    Classified(ArtifactReport),
    Failed {
        exe_path: PathBuf,
        /// Core image the artifact was paired with, if any.
        core_path: Option<PathBuf>,
        error: String,
    },
}

impl ArtifactOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ArtifactOutcome::Failed { .. })
    }
}

/// Load the mapping list and run a full classification pass for one artifact.
pub fn classify_artifact<S: DependencySource + ?Sized>(
    artifact: &ArtifactInput,
    source: &S,
    options: &ClassifyOptions,
) -> ProvenanceResult<ArtifactReport> {
    let exe = artifact.exe_path.as_path();
    let (core_path, mut mappings) = match &artifact.mappings {
        MappingInput::Core(core) => (Some(core.clone()), load_library_mappings(core, Some(exe))?),
        MappingInput::Listed(paths) => {
            (None, paths.iter().cloned().map(LibraryMapping::new).collect::<Vec<_>>())
        }
    };

    let mut descriptor = ForensicDescriptor::new(exe);
    descriptor.core_path = core_path;
    let summary = classify_mappings(&mut descriptor, &mut mappings, source, options)?;

    let literals = if options.corroborate_literals && summary.has_anomalies() {
        match rodata_literals(exe) {
            Ok(literals) => Some(literals),
            Err(err) => {
                warn!("Literal corroboration skipped for {}: {err}", exe.display());
                None
            }
        }
    } else {
        None
    };

    let libraries = mappings
        .iter()
        .map(|mapping| {
            let provenance = mapping.provenance();
            let literal_reference = match (&literals, provenance) {
                (_, Provenance::Linked) | (None, _) => None,
                (Some(literals), _) => Some(
                    mapping.basename().is_some_and(|name| literal_references(name, literals)),
                ),
            };
            LibraryVerdict { path: mapping.path.clone(), provenance, literal_reference }
        })
        .collect();

    Ok(ArtifactReport {
        exe_path: descriptor.exe_path.clone(),
        core_path: descriptor.core_path.clone(),
        dlopen_capable: summary.dlopen_capable,
        resolved: descriptor.resolved_paths().map(PathBuf::from).collect(),
        libraries,
        summary,
        analyzed_at: Utc::now().to_rfc3339(),
    })
}

/// Classify each artifact independently; one failure never stops the rest.
pub fn classify_batch<S: DependencySource + ?Sized>(
    artifacts: &[ArtifactInput],
    source: &S,
    options: &ClassifyOptions,
) -> Vec<ArtifactOutcome> {
    let outcomes: Vec<ArtifactOutcome> = artifacts
        .iter()
        .map(|artifact| match classify_artifact(artifact, source, options) {
            Ok(report) => ArtifactOutcome::Classified(report),
            Err(err) => {
                warn!("Classification failed for {}: {err}", artifact.exe_path.display());
                ArtifactOutcome::Failed {
                    exe_path: artifact.exe_path.clone(),
                    core_path: artifact.core_path().map(Path::to_path_buf),
                    error: error_chain(&err),
                }
            }
        })
        .collect();

    let failed = outcomes.iter().filter(|o| o.is_failed()).count();
    info!("Batch finished: {} classified, {failed} failed", outcomes.len() - failed);
    outcomes
}

/// Render an error with its `source` chain on one line.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        current = cause.source();
    }
    rendered
}
