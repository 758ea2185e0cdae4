//! Library-name literals in the executable's read-only data.
//!
//! A `dlopen("libfoo.so", ...)` call with a constant argument leaves the name
//! in `.rodata`. The scan is a corroborating signal only and never feeds the
//! verdict itself.

use std::path::Path;

use tracing::debug;

use crate::error::{ProvenanceError, ProvenanceResult};
use crate::services::image::{find_section, section_bytes, MappedImage};

/// Starting number of string slots; doubled whenever it fills up.
pub const INITIAL_CAPACITY: usize = 1024;

const LIBRARY_MARKER: &[u8] = b".so";

/// Collect every NUL-terminated run in `rodata` that contains `.so`.
///
/// A trailing run without a terminator is ignored. Non-UTF-8 bytes are
/// replaced rather than dropped so the result is never silently truncated.
pub fn scan_library_literals(rodata: &[u8]) -> ProvenanceResult<Vec<String>> {
    let mut found: Vec<String> = Vec::new();
    grow(&mut found, INITIAL_CAPACITY)?;

    let mut runs = rodata.split(|b| *b == 0);
    // The last piece from split is whatever follows the final NUL.
    runs.next_back();
    for run in runs {
        if !contains(run, LIBRARY_MARKER) {
            continue;
        }
        if found.len() == found.capacity() {
            let target = found.capacity().saturating_mul(2);
            grow(&mut found, target)?;
        }
        found.push(String::from_utf8_lossy(run).into_owned());
    }
    Ok(found)
}

fn grow(found: &mut Vec<String>, target: usize) -> ProvenanceResult<()> {
    let additional = target.saturating_sub(found.len());
    found
        .try_reserve_exact(additional)
        .map_err(|_| ProvenanceError::StringBufferGrowthFailed { requested: target })
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Map the executable and scan its `.rodata`; no such section yields nothing.
pub fn rodata_literals(exe: &Path) -> ProvenanceResult<Vec<String>> {
    let image = MappedImage::open(exe).map_err(|source| {
        ProvenanceError::ExecutableUnreadable { path: exe.to_path_buf(), source }
    })?;
    let malformed =
        |reason: String| ProvenanceError::ExecutableMalformed { path: exe.to_path_buf(), reason };
    let elf = image.parse_elf().map_err(|err| malformed(err.to_string()))?;

    let Some(rodata) = find_section(&elf, ".rodata") else {
        debug!("No .rodata in {}", exe.display());
        return Ok(Vec::new());
    };
    let bytes = section_bytes(image.bytes(), rodata)
        .ok_or_else(|| malformed(".rodata lies outside the image".into()))?;
    let literals = scan_library_literals(bytes)?;
    debug!("{} library literals in {}", literals.len(), exe.display());
    Ok(literals)
}

/// Whether a mapped library's basename is referenced by one of the literals.
///
/// A literal matches when its file-name component equals the basename, or when
/// the basename is a versioned form of it (`libfoo.so` against `libfoo.so.1.2`).
pub fn literal_references(basename: &str, literals: &[String]) -> bool {
    literals.iter().any(|literal| {
        let name = literal.rsplit('/').next().unwrap_or(literal);
        if name.is_empty() {
            return false;
        }
        basename == name
            || basename.strip_prefix(name).is_some_and(|rest| rest.starts_with('.'))
    })
}
