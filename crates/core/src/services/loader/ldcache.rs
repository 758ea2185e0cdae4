//! Reader for the glibc dynamic-loader cache (`/etc/ld.so.cache`).
//!
//! Supports the `glibc-ld.so.cache1.1` layout, standalone or appended after a
//! legacy `ld.so-1.7.0` table. Only the new-format entries are consulted.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use goblin::elf::header::{EM_386, EM_AARCH64, EM_ARM, EM_X86_64};
use scroll::{Pread, NATIVE};

const OLD_MAGIC: &[u8] = b"ld.so-1.7.0";
const OLD_HEADER_LEN: usize = 16;
const OLD_ENTRY_LEN: usize = 12;

const NEW_MAGIC: &[u8] = b"glibc-ld.so.cache";
const NEW_VERSION: &[u8] = b"1.1";
const NEW_HEADER_LEN: usize = 48;
const NEW_ENTRY_LEN: usize = 24;
const NEW_ALIGN: usize = 8;

const FLAG_TYPE_MASK: i32 = 0x00ff;
const FLAG_ELF: i32 = 0x0001;
const FLAG_ELF_LIBC6: i32 = 0x0003;
const FLAG_REQUIRED_MASK: i32 = 0xff00;
const FLAG_X8664_LIB64: i32 = 0x0300;
const FLAG_ARM_LIBHF: i32 = 0x0900;
const FLAG_AARCH64_LIB64: i32 = 0x0a00;

/// One soname → path entry of the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub soname: String,
    pub path: PathBuf,
    pub flags: i32,
}

#[derive(Debug, Clone, Default)]
pub struct LdCache {
    entries: Vec<CacheEntry>,
}

impl LdCache {
    pub fn load(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        Self::parse(&bytes).map_err(|msg| {
            io::Error::new(io::ErrorKind::InvalidData, format!("{}: {msg}", path.display()))
        })
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        let base = if bytes.starts_with(NEW_MAGIC) {
            0
        } else if bytes.starts_with(OLD_MAGIC) {
            let nlibs = read_u32(bytes, 12).ok_or("truncated legacy header")? as usize;
            let legacy_len = nlibs
                .checked_mul(OLD_ENTRY_LEN)
                .and_then(|n| n.checked_add(OLD_HEADER_LEN))
                .ok_or("legacy table size overflow")?;
            let aligned = legacy_len.div_ceil(NEW_ALIGN) * NEW_ALIGN;
            if !bytes.get(aligned..).is_some_and(|rest| rest.starts_with(NEW_MAGIC)) {
                return Err("legacy-only cache format is not supported".into());
            }
            aligned
        } else {
            return Err("unrecognized cache magic".into());
        };

        let data = &bytes[base..];
        if data.get(NEW_MAGIC.len()..NEW_MAGIC.len() + NEW_VERSION.len()) != Some(NEW_VERSION) {
            return Err("unsupported cache version".into());
        }
        let nlibs = read_u32(data, 20).ok_or("truncated header")? as usize;

        let mut entries = Vec::with_capacity(nlibs.min(data.len() / NEW_ENTRY_LEN));
        for idx in 0..nlibs {
            let at = NEW_HEADER_LEN + idx * NEW_ENTRY_LEN;
            let (Some(flags), Some(key), Some(value)) =
                (read_u32(data, at), read_u32(data, at + 4), read_u32(data, at + 8))
            else {
                return Err(format!("truncated entry {idx}"));
            };
            let (Some(soname), Some(path)) = (c_string(data, key), c_string(data, value)) else {
                return Err(format!("entry {idx} points outside the string table"));
            };
            entries.push(CacheEntry {
                soname,
                path: PathBuf::from(path),
                flags: flags as i32,
            });
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry for `soname` usable by an object of the given class and machine.
    pub fn lookup(&self, soname: &str, is_64: bool, machine: u16) -> Option<&Path> {
        self.entries
            .iter()
            .find(|entry| entry.soname == soname && flags_match(entry.flags, is_64, machine))
            .map(|entry| entry.path.as_path())
    }
}

fn flags_match(flags: i32, is_64: bool, machine: u16) -> bool {
    let kind = flags & FLAG_TYPE_MASK;
    if kind != FLAG_ELF_LIBC6 && kind != FLAG_ELF {
        return false;
    }
    let required = flags & FLAG_REQUIRED_MASK;
    match (machine, is_64) {
        (EM_X86_64, true) => required == FLAG_X8664_LIB64,
        (EM_AARCH64, true) => required == FLAG_AARCH64_LIB64,
        (EM_386, false) => required == 0,
        (EM_ARM, false) => required == 0 || required == FLAG_ARM_LIBHF,
        _ => true,
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes.pread_with::<u32>(at, NATIVE).ok()
}

fn c_string(bytes: &[u8], at: u32) -> Option<String> {
    let tail = bytes.get(at as usize..)?;
    let len = tail.iter().position(|b| *b == 0)?;
    Some(String::from_utf8_lossy(&tail[..len]).into_owned())
}
