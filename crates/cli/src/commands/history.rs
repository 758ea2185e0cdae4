use std::path::Path;

use anyhow::{Context, Result};
use provenance_core::db::{open_case_db, ArtifactStatus, MappingRecord, StoredArtifact};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct HistoryEntry {
    #[serde(flatten)]
    artifact: StoredArtifact,
    mappings: Vec<MappingRecord>,
}

/// List recorded classification runs, optionally for one executable.
pub fn history_command(db: &str, exe: Option<&str>, json: bool) -> Result<()> {
    let db = open_case_db(Path::new(db))?;
    let artifacts = db.list_artifacts(exe).context("Failed to list artifacts")?;

    let mut entries = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let mappings = db
            .list_mappings(artifact.id)
            .with_context(|| format!("Failed to load mappings for artifact {}", artifact.id))?;
        entries.push(HistoryEntry { artifact, mappings });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No artifacts recorded.");
        return Ok(());
    }

    for entry in &entries {
        let record = &entry.artifact.record;
        println!(
            "#{} {} [{}] at {}",
            entry.artifact.id,
            record.exe_path,
            record.status.as_str(),
            record.analyzed_at
        );
        if let Some(core) = &record.core_path {
            println!("  core: {core}");
        }
        if let Some(hash) = &record.exe_hash {
            println!("  sha256: {hash}");
        }
        match record.status {
            ArtifactStatus::Failed => {
                println!("  error: {}", record.error.as_deref().unwrap_or("unknown"));
            }
            ArtifactStatus::Classified => {
                for mapping in &entry.mappings {
                    println!("  {:<9} {}", mapping.provenance.as_str(), mapping.path);
                }
            }
        }
    }
    Ok(())
}
