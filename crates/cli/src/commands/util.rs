use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use provenance_core::analysis::{ArtifactInput, ArtifactReport, MappingInput};
use provenance_core::config::AnalysisConfig;
use provenance_core::services::corefile::parse_mapping_list;
use provenance_core::services::LoaderSearch;

/// Build the default dependency walk from the loaded config.
pub fn loader_from_config(config: &AnalysisConfig) -> LoaderSearch {
    LoaderSearch::from_config(&config.search)
}

/// Turn `--core`/`--maps` into a mapping input; exactly one must be given.
pub fn artifact_input(
    exe: &Path,
    core: Option<&Path>,
    maps: Option<&Path>,
) -> Result<ArtifactInput> {
    let mappings = match (core, maps) {
        (Some(core), None) => MappingInput::Core(core.to_path_buf()),
        (None, Some(maps)) => {
            let text = fs::read_to_string(maps)
                .with_context(|| format!("Failed to read mapping list at {}", maps.display()))?;
            let listed = parse_mapping_list(&text, Some(exe));
            MappingInput::Listed(listed.into_iter().map(|m| m.path).collect())
        }
        (Some(_), Some(_)) => {
            return Err(anyhow!("Pass either a core image or a mapping list, not both"))
        }
        (None, None) => return Err(anyhow!("A core image or a mapping list is required")),
    };
    Ok(ArtifactInput { exe_path: exe.to_path_buf(), mappings })
}

/// Human-readable rendering of one report.
pub fn print_report(report: &ArtifactReport) {
    println!("Executable: {}", report.exe_path.display());
    match &report.core_path {
        Some(core) => println!("Core: {}", core.display()),
        None => println!("Core: (mapping list)"),
    }
    println!("dlopen imported: {}", if report.dlopen_capable { "yes" } else { "no" });
    println!("Resolved dependencies: {}", report.resolved.len());
    println!("Libraries:");
    for lib in &report.libraries {
        let literal = match lib.literal_reference {
            Some(true) => " [literal: yes]",
            Some(false) => " [literal: no]",
            None => "",
        };
        println!("  {:<9} {}{literal}", lib.provenance.as_str(), lib.path.display());
    }
    println!(
        "Summary: {} linked, {} dlopened, {} injected",
        report.summary.linked, report.summary.dlopened, report.summary.injected
    );
}
