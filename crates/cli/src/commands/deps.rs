use std::path::Path;

use anyhow::{anyhow, Result};
use provenance_core::analysis::canonicalize_entry;
use provenance_core::services::{DependencySource, ResolveMode, WalkEntry};
use serde::Serialize;

use crate::commands::loader_from_config;
use crate::{canonicalize_or_current, load_config};

#[derive(Debug, Serialize)]
struct DepLine {
    name: String,
    path: Option<String>,
    canonical: Option<String>,
}

/// Print the dependency walk of an executable in walk order.
pub fn deps_command(exe: &str, direct: bool, config: Option<&str>, json: bool) -> Result<()> {
    let config = load_config(config.map(Path::new))?;
    let exe_path = canonicalize_or_current(exe)?;
    let source = loader_from_config(&config);
    let mode = if direct { ResolveMode::Direct } else { ResolveMode::Transitive };

    let walk = source.walk(&exe_path, mode).map_err(|err| {
        anyhow!("Dependency walk could not start for {}: {err}", exe_path.display())
    })?;

    let mut lines = Vec::new();
    for step in walk {
        let line = match step.map_err(|err| anyhow!("Dependency walk failed: {err}"))? {
            WalkEntry::Found { path, basename } => {
                let canonical = canonicalize_entry(&path)?;
                DepLine {
                    name: basename,
                    path: Some(path.to_string_lossy().to_string()),
                    canonical: Some(canonical.to_string_lossy().to_string()),
                }
            }
            WalkEntry::NotFound { name } => DepLine { name, path: None, canonical: None },
        };
        lines.push(line);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
        return Ok(());
    }

    println!("Dependencies of {}:", exe_path.display());
    for line in &lines {
        match (&line.path, &line.canonical) {
            (Some(path), Some(canonical)) if path != canonical => {
                println!("  {} => {path} -> {canonical}", line.name)
            }
            (Some(path), _) => println!("  {} => {path}", line.name),
            _ => println!("  {} => not found", line.name),
        }
    }
    Ok(())
}
