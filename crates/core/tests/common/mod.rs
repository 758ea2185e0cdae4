//! Shared fixtures: ELF objects and cores, ld.so caches, and a scripted
//! dependency source.
#![allow(dead_code)]

mod elf;

use std::fs;
use std::path::{Path, PathBuf};

use provenance_core::services::{
    DependencySource, DependencyWalk, ResolveMode, WalkEntry, WalkError,
};

pub use elf::*;

/// `FLAG_ELF_LIBC6 | FLAG_X8664_LIB64`.
pub const CACHE_FLAGS_X86_64: i32 = 0x0303;

/// Write a `glibc-ld.so.cache1.1` cache mapping each soname to a path.
pub fn write_ld_cache(path: &Path, entries: &[(&str, &Path, i32)]) {
    const HEADER_LEN: usize = 48;
    const ENTRY_LEN: usize = 24;

    let strings_base = HEADER_LEN + entries.len() * ENTRY_LEN;
    let mut strings = Vec::new();
    let mut table = Vec::new();
    for (soname, target, flags) in entries {
        let key = strings_base + strings.len();
        strings.extend_from_slice(soname.as_bytes());
        strings.push(0);
        let value = strings_base + strings.len();
        strings.extend_from_slice(target.to_str().expect("utf-8 path").as_bytes());
        strings.push(0);
        table.extend_from_slice(&flags.to_ne_bytes());
        table.extend_from_slice(&(key as u32).to_ne_bytes());
        table.extend_from_slice(&(value as u32).to_ne_bytes());
        table.extend_from_slice(&0u32.to_ne_bytes());
        table.extend_from_slice(&0u64.to_ne_bytes());
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"glibc-ld.so.cache1.1");
    out.extend_from_slice(&(entries.len() as u32).to_ne_bytes());
    out.extend_from_slice(&(strings.len() as u32).to_ne_bytes());
    out.resize(HEADER_LEN, 0);
    out.extend_from_slice(&table);
    out.extend_from_slice(&strings);
    fs::write(path, out).expect("write ld.so.cache");
}

/// One scripted step of a fake dependency walk.
#[derive(Debug, Clone)]
pub enum Step {
    Found(PathBuf),
    Missing(&'static str),
    Fail,
}

/// Dependency source replaying a fixed script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    pub init_fails: bool,
    pub steps: Vec<Step>,
}

impl ScriptedSource {
    pub fn found(paths: &[&str]) -> Self {
        Self { init_fails: false, steps: paths.iter().map(|p| Step::Found(p.into())).collect() }
    }

    pub fn failing_init() -> Self {
        Self { init_fails: true, steps: Vec::new() }
    }
}

impl DependencySource for ScriptedSource {
    fn walk<'a>(
        &'a self,
        _exe: &Path,
        _mode: ResolveMode,
    ) -> Result<DependencyWalk<'a>, WalkError> {
        if self.init_fails {
            return Err(WalkError::Other("executable has no dynamic section".into()));
        }
        Ok(Box::new(self.steps.iter().map(|step| match step {
            Step::Found(path) => Ok(WalkEntry::Found {
                path: path.clone(),
                basename: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            }),
            Step::Missing(name) => Ok(WalkEntry::NotFound { name: name.to_string() }),
            Step::Fail => Err(WalkError::Other("dynamic section truncated".into())),
        })))
    }
}
