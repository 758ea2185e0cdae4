//! Extraction of the shared-library mapping list from an ELF core image.
//!
//! Linux cores carry an `NT_FILE` note (owner `CORE`) in a `PT_NOTE` segment
//! listing every file-backed mapping:
//! `count, page_size, {start, end, file_ofs}[count], names[count]`,
//! with words sized by the core's ELF class.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use goblin::elf::header::ET_CORE;
use goblin::elf::note::NT_FILE;
use scroll::{Endian, Pread};
use tracing::debug;

use crate::error::{ProvenanceError, ProvenanceResult};
use crate::model::LibraryMapping;
use crate::services::image::MappedImage;

const CORE_OWNER: &str = "CORE";

/// One file-backed mapping recorded in `NT_FILE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMapping {
    pub start: u64,
    pub end: u64,
    pub file_offset: u64,
    pub path: PathBuf,
}

/// Read every `NT_FILE` entry of a core image.
pub fn read_file_mappings(core: &Path) -> ProvenanceResult<Vec<FileMapping>> {
    let image = MappedImage::open(core)
        .map_err(|source| ProvenanceError::CoreUnreadable { path: core.to_path_buf(), source })?;
    let malformed =
        |reason: String| ProvenanceError::CoreMalformed { path: core.to_path_buf(), reason };

    let elf = image.parse_elf().map_err(|err| malformed(err.to_string()))?;
    if elf.header.e_type != ET_CORE {
        return Err(malformed(format!("ELF type {} is not ET_CORE", elf.header.e_type)));
    }

    let notes = elf.iter_note_headers(image.bytes()).into_iter().flatten();
    let mut mappings = Vec::new();
    for note in notes {
        let note = note.map_err(|err| malformed(format!("PT_NOTE: {err}")))?;
        if note.n_type == NT_FILE && note.name == CORE_OWNER {
            let files =
                parse_nt_file(note.desc, elf.is_64, elf.little_endian).map_err(malformed)?;
            mappings.extend(files);
        }
    }
    debug!("{} NT_FILE entries in {}", mappings.len(), core.display());
    Ok(mappings)
}

/// Decode the descriptor of one `NT_FILE` note.
pub fn parse_nt_file(
    desc: &[u8],
    is_64: bool,
    little_endian: bool,
) -> Result<Vec<FileMapping>, String> {
    let word = if is_64 { 8 } else { 4 };
    let endian = if little_endian { Endian::Little } else { Endian::Big };
    let read_word = |at: usize| -> Option<u64> {
        if is_64 {
            desc.pread_with::<u64>(at, endian).ok()
        } else {
            desc.pread_with::<u32>(at, endian).ok().map(u64::from)
        }
    };

    let count = read_word(0).ok_or("NT_FILE header truncated")?;
    let count = usize::try_from(count).map_err(|_| "NT_FILE count overflows")?;
    let table_len = count
        .checked_mul(3 * word)
        .and_then(|n| n.checked_add(2 * word))
        .filter(|end| *end <= desc.len())
        .ok_or("NT_FILE table exceeds note")?;

    let mut names = desc[table_len..].split(|b| *b == 0);
    let mut out = Vec::with_capacity(count);
    for idx in 0..count {
        let at = 2 * word + idx * 3 * word;
        let (Some(start), Some(end), Some(file_offset)) =
            (read_word(at), read_word(at + word), read_word(at + 2 * word))
        else {
            return Err(format!("NT_FILE entry {idx} truncated"));
        };
        let name = names.next().ok_or_else(|| format!("NT_FILE entry {idx} has no file name"))?;
        out.push(FileMapping {
            start,
            end,
            file_offset,
            path: PathBuf::from(OsStr::from_bytes(name)),
        });
    }
    Ok(out)
}

/// Keep shared-object mappings, one record per path in first-seen order.
pub fn library_mappings(files: &[FileMapping], exe: Option<&Path>) -> Vec<LibraryMapping> {
    let mut seen = HashSet::new();
    files
        .iter()
        .filter(|file| exe.map_or(true, |exe| file.path.as_os_str() != exe.as_os_str()))
        .filter(|file| {
            file.path
                .file_name()
                .is_some_and(|name| name.as_bytes().windows(3).any(|w| w == b".so"))
        })
        .filter(|file| seen.insert(file.path.clone()))
        .map(|file| LibraryMapping::new(file.path.clone()))
        .collect()
}

/// Library mapping list of a core image, excluding the executable itself.
pub fn load_library_mappings(
    core: &Path,
    exe: Option<&Path>,
) -> ProvenanceResult<Vec<LibraryMapping>> {
    let files = read_file_mappings(core)?;
    Ok(library_mappings(&files, exe))
}

/// Parse an analyst-supplied mapping list: a JSON array of paths, or one path per line.
///
/// Blank lines and `#` comments are ignored. The list is taken as-is apart
/// from dropping the executable and repeated paths.
pub fn parse_mapping_list(text: &str, exe: Option<&Path>) -> Vec<LibraryMapping> {
    let paths: Vec<PathBuf> = match serde_json::from_str::<Vec<PathBuf>>(text) {
        Ok(paths) => paths,
        Err(_) => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(PathBuf::from)
            .collect(),
    };

    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter(|path| exe.map_or(true, |exe| path.as_os_str() != exe.as_os_str()))
        .filter(|path| seen.insert(path.clone()))
        .map(LibraryMapping::new)
        .collect()
}
