use anyhow::{Context, Result};
use provenance_core::analysis::{probe_dynamic_symbol, Capability};
use serde_json::json;

use crate::canonicalize_or_current;

/// Report whether the executable imports `symbol` through `.dynsym`.
pub fn probe_command(exe: &str, symbol: &str, json: bool) -> Result<()> {
    let exe_path = canonicalize_or_current(exe)?;
    let capability = probe_dynamic_symbol(&exe_path, symbol)
        .with_context(|| format!("Failed to probe {}", exe_path.display()))?;

    if json {
        let value = json!({
            "exe": exe_path,
            "symbol": symbol,
            "capability": capability,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        let verdict = match capability {
            Capability::Imported => "imported",
            Capability::NotImported => "not imported",
            Capability::NoDynamicSymbolTable => "not imported (no dynamic symbol table)",
        };
        println!("{symbol}: {verdict}");
    }
    Ok(())
}
