use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use provenance_core::analysis::{classify_batch, ArtifactInput, ArtifactOutcome};
use provenance_core::db::open_case_db;
use serde::Deserialize;

use crate::commands::{artifact_input, loader_from_config};
use crate::{canonicalize_or_current, load_config, load_structured, sha256_file};

/// One artifact listed in a batch manifest. Relative paths are taken from the
/// manifest's directory; executables are canonicalized like `classify` does.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    #[serde(default)]
    pub name: Option<String>,
    pub exe: PathBuf,
    #[serde(default)]
    pub core: Option<PathBuf>,
    #[serde(default)]
    pub maps: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BatchManifest {
    Wrapped { artifacts: Vec<ManifestEntry> },
    List(Vec<ManifestEntry>),
}

impl BatchManifest {
    pub fn into_entries(self) -> Vec<ManifestEntry> {
        match self {
            BatchManifest::Wrapped { artifacts } => artifacts,
            BatchManifest::List(entries) => entries,
        }
    }
}

/// Classify every artifact of a manifest; fails when any artifact failed.
pub fn batch_command(
    manifest: &str,
    config: Option<&str>,
    db: Option<&str>,
    json: bool,
) -> Result<()> {
    let config = load_config(config.map(Path::new))?;
    let manifest_path = Path::new(manifest);
    let base = manifest_path.parent().unwrap_or(Path::new("."));
    let entries = load_structured::<BatchManifest>(manifest_path, "batch manifest")?.into_entries();

    // Entries whose inputs cannot even be assembled fail on their own.
    let mut prepared: Vec<(ManifestEntry, PathBuf, Result<ArtifactInput>)> =
        Vec::with_capacity(entries.len());
    for entry in entries {
        let exe = canonicalize_or_current(base.join(&entry.exe))?;
        let core = entry.core.as_ref().map(|p| base.join(p));
        let maps = entry.maps.as_ref().map(|p| base.join(p));
        let input = artifact_input(&exe, core.as_deref(), maps.as_deref());
        prepared.push((entry, exe, input));
    }

    let ready: Vec<ArtifactInput> =
        prepared.iter().filter_map(|(_, _, input)| input.as_ref().ok().cloned()).collect();
    let source = loader_from_config(&config);
    let mut classified = classify_batch(&ready, &source, &config.classify_options()).into_iter();

    let mut outcomes = Vec::with_capacity(prepared.len());
    for (entry, exe, input) in &prepared {
        let outcome = match input {
            Ok(_) => classified
                .next()
                .ok_or_else(|| anyhow!("Batch returned fewer outcomes than inputs"))?,
            Err(err) => ArtifactOutcome::Failed {
                exe_path: exe.clone(),
                core_path: entry.core.as_ref().map(|p| base.join(p)),
                error: format!("{err:#}"),
            },
        };
        outcomes.push((entry.name.clone(), outcome));
    }

    if let Some(db_path) = db {
        let db = open_case_db(Path::new(db_path))?;
        let now = Utc::now().to_rfc3339();
        for (_, outcome) in &outcomes {
            let exe = match outcome {
                ArtifactOutcome::Classified(report) => &report.exe_path,
                ArtifactOutcome::Failed { exe_path, .. } => exe_path,
            };
            let hash = sha256_file(exe).ok();
            db.record_outcome(outcome, hash.as_deref(), &now)
                .with_context(|| format!("Failed to record outcome for {}", exe.display()))?;
        }
    }

    if json {
        let list: Vec<&ArtifactOutcome> = outcomes.iter().map(|(_, o)| o).collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        for (name, outcome) in &outcomes {
            print_outcome(name.as_deref(), outcome);
        }
    }

    let failed = outcomes.iter().filter(|(_, o)| o.is_failed()).count();
    if failed > 0 {
        return Err(anyhow!("{failed} of {} artifacts failed", outcomes.len()));
    }
    Ok(())
}

fn print_outcome(name: Option<&str>, outcome: &ArtifactOutcome) {
    match outcome {
        ArtifactOutcome::Classified(report) => {
            let label = name
                .map(str::to_string)
                .unwrap_or_else(|| report.exe_path.display().to_string());
            let status = if report.summary.has_anomalies() { "anomalies" } else { "clean" };
            println!(
                "{label}: {status} ({} linked, {} dlopened, {} injected)",
                report.summary.linked, report.summary.dlopened, report.summary.injected
            );
            for lib in report.anomalies() {
                println!("  {:<9} {}", lib.provenance.as_str(), lib.path.display());
            }
        }
        ArtifactOutcome::Failed { exe_path, error, .. } => {
            let label =
                name.map(str::to_string).unwrap_or_else(|| exe_path.display().to_string());
            println!("{label}: FAILED: {error}");
        }
    }
}
