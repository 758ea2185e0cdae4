//! Default [`DependencySource`]: emulates how the glibc loader locates
//! `DT_NEEDED` entries on the analysis host.
//!
//! Search order for a bare soname requested by some object:
//! 1. `DT_RPATH` of the requester and its loader chain, only when the requester
//!    has no `DT_RUNPATH`.
//! 2. The configured library path (the `LD_LIBRARY_PATH` stand-in).
//! 3. `DT_RUNPATH` of the requester.
//! 4. The `ld.so.cache`.
//! 5. Default system directories, multiarch first.
//!
//! Candidates must match the executable's ELF class, byte order and machine.
//! Every `DT_NEEDED` occurrence yields an entry; each object's own dependencies
//! are expanded once, so dependency cycles terminate.

pub mod ldcache;

use std::collections::{HashSet, VecDeque};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use goblin::container::Container;
use goblin::elf::header::header64::SIZEOF_EHDR;
use goblin::elf::header::{EM_386, EM_AARCH64, EM_ARM, EM_RISCV, EM_X86_64};
use goblin::elf::Elf;
use path_clean::PathClean;
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::services::deps::{DependencySource, DependencyWalk, ResolveMode, WalkEntry, WalkError};
use crate::services::image::MappedImage;

pub use ldcache::LdCache;

/// Class, byte order and machine of an ELF object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ElfIdent {
    is_64: bool,
    little_endian: bool,
    machine: u16,
}

/// Dynamic-section facts needed to continue a walk through one object.
#[derive(Debug)]
struct ObjectInfo {
    ident: ElfIdent,
    needed: Vec<String>,
    rpath: Vec<String>,
    runpath: Vec<String>,
}

/// Search context of the object that declared a dependency.
#[derive(Debug)]
struct Requester {
    /// Own `DT_RPATH` followed by every loader's, up to the executable.
    /// An object with `DT_RUNPATH` contributes nothing of its own.
    rpath: Vec<PathBuf>,
    runpath: Vec<PathBuf>,
    has_runpath: bool,
}

#[derive(Debug)]
struct Pending {
    name: String,
    requester: Rc<Requester>,
}

/// Loader-emulating dependency source.
#[derive(Debug, Clone, Default)]
pub struct LoaderSearch {
    library_path: Vec<PathBuf>,
    cache: LdCache,
    default_dirs: Option<Vec<PathBuf>>,
}

impl LoaderSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library_path(mut self, dirs: Vec<PathBuf>) -> Self {
        self.library_path = dirs;
        self
    }

    pub fn with_cache(mut self, cache: LdCache) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the built-in system directories.
    pub fn with_default_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.default_dirs = Some(dirs);
        self
    }

    /// Build a search from configuration. An unreadable cache is logged and ignored.
    pub fn from_config(config: &SearchConfig) -> Self {
        let mut library_path = Vec::new();
        if config.use_ld_library_path_env {
            if let Some(raw) = std::env::var_os("LD_LIBRARY_PATH") {
                library_path
                    .extend(std::env::split_paths(&raw).filter(|p| !p.as_os_str().is_empty()));
            }
        }
        library_path.extend(config.library_path.iter().cloned());

        let cache = match &config.ld_so_cache {
            Some(path) => LdCache::load(path).unwrap_or_else(|err| {
                warn!("ld.so cache unavailable at {}: {err}", path.display());
                LdCache::default()
            }),
            None => LdCache::default(),
        };

        Self { library_path, cache, default_dirs: config.default_dirs.clone() }
    }

    fn system_dirs(&self, ident: ElfIdent) -> Vec<PathBuf> {
        if let Some(dirs) = &self.default_dirs {
            return dirs.clone();
        }
        let triplet = match (ident.machine, ident.is_64) {
            (EM_X86_64, true) => Some("x86_64-linux-gnu"),
            (EM_AARCH64, true) => Some("aarch64-linux-gnu"),
            (EM_RISCV, true) => Some("riscv64-linux-gnu"),
            (EM_386, false) => Some("i386-linux-gnu"),
            (EM_ARM, false) => Some("arm-linux-gnueabihf"),
            _ => None,
        };
        let mut dirs = Vec::new();
        if let Some(triplet) = triplet {
            dirs.push(Path::new("/lib").join(triplet));
            dirs.push(Path::new("/usr/lib").join(triplet));
        }
        if ident.is_64 {
            dirs.push(PathBuf::from("/lib64"));
            dirs.push(PathBuf::from("/usr/lib64"));
        }
        dirs.push(PathBuf::from("/lib"));
        dirs.push(PathBuf::from("/usr/lib"));
        dirs
    }
}

impl DependencySource for LoaderSearch {
    fn walk<'a>(&'a self, exe: &Path, mode: ResolveMode) -> Result<DependencyWalk<'a>, WalkError> {
        let info = load_object(exe)?;
        debug!(
            "Walking {} DT_NEEDED entries of {} ({:?})",
            info.needed.len(),
            exe.display(),
            mode
        );
        let mut walk = NeededWalk {
            search: self,
            target: info.ident,
            system_dirs: self.system_dirs(info.ident),
            mode,
            queue: VecDeque::new(),
            expanded: HashSet::from([exe.to_path_buf()]),
        };
        walk.enqueue(exe, info, None);
        Ok(Box::new(walk))
    }
}

/// Breadth-first walk over `DT_NEEDED` edges.
struct NeededWalk<'a> {
    search: &'a LoaderSearch,
    target: ElfIdent,
    system_dirs: Vec<PathBuf>,
    mode: ResolveMode,
    queue: VecDeque<Pending>,
    expanded: HashSet<PathBuf>,
}

impl NeededWalk<'_> {
    fn enqueue(&mut self, object: &Path, info: ObjectInfo, parent: Option<&Requester>) {
        let origin = object.parent().unwrap_or_else(|| Path::new(""));
        let has_runpath = !info.runpath.is_empty();
        let runpath = normalize_search_paths(&info.runpath, origin);
        let mut rpath =
            if has_runpath { Vec::new() } else { normalize_search_paths(&info.rpath, origin) };
        if let Some(parent) = parent {
            rpath.extend(parent.rpath.iter().cloned());
        }
        let requester = Rc::new(Requester { rpath, runpath, has_runpath });
        for name in info.needed {
            self.queue.push_back(Pending { name, requester: Rc::clone(&requester) });
        }
    }

    fn accepts(&self, candidate: &Path) -> bool {
        read_ident(candidate) == Some(self.target)
    }

    fn locate(&self, pending: &Pending) -> Option<PathBuf> {
        if pending.name.contains('/') {
            let path = PathBuf::from(&pending.name);
            return self.accepts(&path).then_some(path);
        }

        let requester = &pending.requester;
        let rpath: &[PathBuf] = if requester.has_runpath { &[] } else { &requester.rpath };
        let dirs = rpath
            .iter()
            .chain(self.search.library_path.iter())
            .chain(requester.runpath.iter());
        for dir in dirs {
            let candidate = dir.join(&pending.name);
            if self.accepts(&candidate) {
                return Some(candidate);
            }
        }

        if let Some(cached) =
            self.search.cache.lookup(&pending.name, self.target.is_64, self.target.machine)
        {
            if self.accepts(cached) {
                return Some(cached.to_path_buf());
            }
        }

        self.system_dirs
            .iter()
            .map(|dir| dir.join(&pending.name))
            .find(|candidate| self.accepts(candidate))
    }
}

impl Iterator for NeededWalk<'_> {
    type Item = Result<WalkEntry, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        let pending = self.queue.pop_front()?;
        let Some(path) = self.locate(&pending) else {
            return Some(Ok(WalkEntry::NotFound { name: pending.name }));
        };

        if self.mode == ResolveMode::Transitive && self.expanded.insert(path.clone()) {
            match load_object(&path) {
                Ok(info) => self.enqueue(&path, info, Some(pending.requester.as_ref())),
                Err(err) => return Some(Err(err)),
            }
        }

        let basename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or(pending.name);
        Some(Ok(WalkEntry::Found { path, basename }))
    }
}

fn load_object(path: &Path) -> Result<ObjectInfo, WalkError> {
    let image = MappedImage::open(path)
        .map_err(|source| WalkError::Io { path: path.to_path_buf(), source })?;
    let elf = image
        .parse_elf()
        .map_err(|source| WalkError::Parse { path: path.to_path_buf(), source })?;

    let split = |entries: &[&str]| -> Vec<String> {
        entries
            .iter()
            .flat_map(|entry| entry.split(':'))
            .filter(|dir| !dir.is_empty())
            .map(str::to_string)
            .collect()
    };

    Ok(ObjectInfo {
        ident: ElfIdent {
            is_64: elf.is_64,
            little_endian: elf.little_endian,
            machine: elf.header.e_machine,
        },
        needed: elf.libraries.iter().map(|name| name.to_string()).collect(),
        rpath: split(&elf.rpaths),
        runpath: split(&elf.runpaths),
    })
}

fn read_ident(path: &Path) -> Option<ElfIdent> {
    let mut bytes = Vec::with_capacity(SIZEOF_EHDR);
    File::open(path).ok()?.take(SIZEOF_EHDR as u64).read_to_end(&mut bytes).ok()?;
    let header = Elf::parse_header(&bytes).ok()?;
    Some(ElfIdent {
        is_64: header.container().ok()? == Container::Big,
        little_endian: header.endianness().ok()?.is_little(),
        machine: header.e_machine,
    })
}

/// Substitute `$ORIGIN` and keep only absolute, lexically cleaned directories.
fn normalize_search_paths(entries: &[String], origin: &Path) -> Vec<PathBuf> {
    let origin = origin.to_string_lossy();
    entries
        .iter()
        .filter_map(|entry| {
            let resolved = entry.replace("${ORIGIN}", &origin).replace("$ORIGIN", &origin);
            resolved.starts_with('/').then(|| PathBuf::from(resolved).clean())
        })
        .collect()
}
