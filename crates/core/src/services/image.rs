use std::fs::File;
use std::io;
use std::path::Path;

use goblin::elf::section_header::{SectionHeader, SHT_NOBITS};
use goblin::elf::Elf;
use memmap2::Mmap;

/// A file mapped read-only into memory.
///
/// The mapping and its file descriptor are released when this value drops.
#[derive(Debug)]
pub struct MappedImage {
    map: Mmap,
}

impl MappedImage {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the map is read-only and private to this value; callers treat
        // the bytes as untrusted input and bounds-check every access.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self { map })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.map
    }

    pub fn parse_elf(&self) -> goblin::error::Result<Elf<'_>> {
        Elf::parse(&self.map)
    }
}

/// Find a section header by name. The last match wins when names repeat.
pub fn find_section<'e>(elf: &'e Elf<'_>, name: &str) -> Option<&'e SectionHeader> {
    elf.section_headers.iter().rev().find(|sh| elf.shdr_strtab.get_at(sh.sh_name) == Some(name))
}

/// File-backed contents of a section, or `None` when it lies outside the image.
pub fn section_bytes<'a>(bytes: &'a [u8], sh: &SectionHeader) -> Option<&'a [u8]> {
    if sh.sh_type == SHT_NOBITS {
        return Some(&[]);
    }
    let start = usize::try_from(sh.sh_offset).ok()?;
    let len = usize::try_from(sh.sh_size).ok()?;
    let end = start.checked_add(len)?;
    bytes.get(start..end)
}
