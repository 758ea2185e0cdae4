//! Capability probe: does the executable import the dynamic-loading primitive?

use std::path::Path;

use goblin::container::Ctx;
use goblin::elf::sym::{Sym, Symtab};
use goblin::strtab::Strtab;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProvenanceError, ProvenanceResult};
use crate::services::image::{find_section, MappedImage};

pub const DLOPEN_SYMBOL: &str = "dlopen";

/// Outcome of scanning `.dynsym` for one symbol name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Imported,
    NotImported,
    /// No `.dynsym` section at all (static or stripped binaries).
    NoDynamicSymbolTable,
}

impl Capability {
    pub fn is_present(self) -> bool {
        self == Capability::Imported
    }
}

/// Probe the executable for a `dlopen` import.
pub fn probe_dlopen(exe: &Path) -> ProvenanceResult<Capability> {
    probe_dynamic_symbol(exe, DLOPEN_SYMBOL)
}

/// Linearly scan the executable's `.dynsym` for an exact name match.
///
/// Symbols are decoded with the executable's own class and byte order.
///
/// The executable is mapped read-only for the duration of the scan and
/// unmapped on every return path.
pub fn probe_dynamic_symbol(exe: &Path, symbol: &str) -> ProvenanceResult<Capability> {
    let image = MappedImage::open(exe).map_err(|source| {
        ProvenanceError::ExecutableUnreadable { path: exe.to_path_buf(), source }
    })?;
    let malformed =
        |reason: String| ProvenanceError::ExecutableMalformed { path: exe.to_path_buf(), reason };

    let elf = image.parse_elf().map_err(|err| malformed(err.to_string()))?;
    let bytes = image.bytes();

    let Some(dynsym) = find_section(&elf, ".dynsym") else {
        debug!("No .dynsym in {}; {symbol} cannot be imported", exe.display());
        return Ok(Capability::NoDynamicSymbolTable);
    };
    let container = elf.header.container().map_err(|err| malformed(err.to_string()))?;
    let endian = elf.header.endianness().map_err(|err| malformed(err.to_string()))?;
    let ctx = Ctx::new(container, endian);
    let count = dynsym.sh_size as usize / Sym::size(container);
    let symbols = Symtab::parse(bytes, dynsym.sh_offset as usize, count, ctx)
        .map_err(|err| malformed(format!(".dynsym: {err}")))?;

    let dynstr = find_section(&elf, ".dynstr")
        .ok_or_else(|| malformed(".dynsym present without a .dynstr".into()))?;
    let names = Strtab::parse(bytes, dynstr.sh_offset as usize, dynstr.sh_size as usize, 0)
        .map_err(|err| malformed(format!(".dynstr: {err}")))?;

    if symbols.iter().any(|sym| names.get_at(sym.st_name) == Some(symbol)) {
        debug!("{symbol} is imported by {}", exe.display());
        return Ok(Capability::Imported);
    }
    Ok(Capability::NotImported)
}
