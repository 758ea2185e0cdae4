use std::path::Path;

use anyhow::{Context, Result};
use provenance_core::analysis::classify_artifact;
use provenance_core::db::open_case_db;

use crate::commands::{artifact_input, loader_from_config, print_report};
use crate::{canonicalize_or_current, load_config, sha256_file};

/// Classify the mapped libraries of one artifact.
pub fn classify_command(
    exe: &str,
    core: Option<&str>,
    maps: Option<&str>,
    config: Option<&str>,
    db: Option<&str>,
    json: bool,
) -> Result<()> {
    let config = load_config(config.map(Path::new))?;
    let exe_path = canonicalize_or_current(exe)?;
    let input = artifact_input(&exe_path, core.map(Path::new), maps.map(Path::new))?;

    let source = loader_from_config(&config);
    let report = classify_artifact(&input, &source, &config.classify_options())
        .with_context(|| format!("Failed to classify {}", exe_path.display()))?;

    if let Some(db_path) = db {
        let db = open_case_db(Path::new(db_path))?;
        let hash = sha256_file(&exe_path)?;
        let id = db.record_report(&report, Some(&hash)).context("Failed to record report")?;
        tracing::info!("Recorded artifact {id} in {db_path}");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}
