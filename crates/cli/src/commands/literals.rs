use anyhow::{Context, Result};
use provenance_core::analysis::rodata_literals;

use crate::canonicalize_or_current;

/// List `.so` string literals found in the executable's `.rodata`.
pub fn literals_command(exe: &str, json: bool) -> Result<()> {
    let exe_path = canonicalize_or_current(exe)?;
    let literals = rodata_literals(&exe_path)
        .with_context(|| format!("Failed to scan {}", exe_path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&literals)?);
        return Ok(());
    }

    if literals.is_empty() {
        println!("No library literals found.");
        return Ok(());
    }
    println!("Library literals in {}:", exe_path.display());
    for literal in &literals {
        println!("  {literal}");
    }
    Ok(())
}
