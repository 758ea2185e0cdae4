//! ELF fixtures emitted with `object`'s ELF writer: dynamically linked objects
//! with `.dynsym`/`.dynstr`/`.dynamic`, and core images carrying `NT_FILE`.
#![allow(dead_code)]

use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use object::elf;
use object::write::elf::{FileHeader, ProgramHeader, SectionHeader, Sym, Writer};
use object::Endianness;

pub use object::elf::{EM_386, EM_AARCH64, EM_PPC, EM_PPC64, EM_X86_64};

const NT_FILE: u32 = 0x4649_4c45;

/// Builder for a small dynamically linked object.
///
/// Every byte sits in one identity-mapped `PT_LOAD`, so dynamic-section
/// addresses double as file offsets.
#[derive(Debug, Clone)]
pub struct ElfFixture {
    e_type: u16,
    machine: u16,
    is_64: bool,
    endian: Endianness,
    soname: String,
    needed: Vec<String>,
    rpath: Option<String>,
    runpath: Option<String>,
    symbols: Vec<String>,
    dynsym: bool,
    rodata: Vec<u8>,
}

impl ElfFixture {
    pub fn executable() -> Self {
        Self {
            e_type: elf::ET_EXEC,
            machine: EM_X86_64,
            is_64: true,
            endian: Endianness::Little,
            soname: "fixture".into(),
            needed: Vec::new(),
            rpath: None,
            runpath: None,
            symbols: Vec::new(),
            dynsym: true,
            rodata: Vec::new(),
        }
    }

    pub fn shared_object() -> Self {
        Self { e_type: elf::ET_DYN, ..Self::executable() }
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn elf32(mut self) -> Self {
        self.is_64 = false;
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.endian = Endianness::Big;
        self
    }

    pub fn needs(mut self, name: &str) -> Self {
        self.needed.push(name.to_string());
        self
    }

    pub fn rpath(mut self, value: &str) -> Self {
        self.rpath = Some(value.to_string());
        self
    }

    pub fn runpath(mut self, value: &str) -> Self {
        self.runpath = Some(value.to_string());
        self
    }

    /// Add an undefined global function symbol (an import).
    pub fn imports(mut self, name: &str) -> Self {
        self.symbols.push(name.to_string());
        self
    }

    /// Drop `.dynsym` entirely.
    pub fn without_dynsym(mut self) -> Self {
        self.dynsym = false;
        self
    }

    pub fn rodata(mut self, bytes: &[u8]) -> Self {
        self.rodata = bytes.to_vec();
        self
    }

    pub fn write(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dir");
        }
        fs::write(path, self.build()).expect("write fixture");
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut writer = Writer::new(self.endian, self.is_64, &mut out);
        let sym_size: u64 = if self.is_64 { 24 } else { 16 };

        writer.reserve_file_header();
        writer.reserve_program_headers(2);

        // DT_SONAME keeps .dynstr non-empty.
        let soname = writer.add_dynamic_string(self.soname.as_bytes());
        let needed: Vec<_> =
            self.needed.iter().map(|name| writer.add_dynamic_string(name.as_bytes())).collect();
        let rpath = self.rpath.as_ref().map(|dirs| writer.add_dynamic_string(dirs.as_bytes()));
        let runpath =
            self.runpath.as_ref().map(|dirs| writer.add_dynamic_string(dirs.as_bytes()));
        let symbols: Vec<_> = if self.dynsym {
            self.symbols.iter().map(|name| writer.add_dynamic_string(name.as_bytes())).collect()
        } else {
            Vec::new()
        };

        writer.reserve_null_section_index();
        if self.dynsym {
            writer.reserve_dynsym_section_index();
        }
        writer.reserve_dynamic_section_index();
        writer.reserve_dynstr_section_index();
        let rodata_name = writer.add_section_name(b".rodata");
        writer.reserve_section_index();
        writer.reserve_shstrtab_section_index();

        // Pointer-aligned tables go first, right after the program headers.
        let dynsym_offset = writer.reserved_len();
        if self.dynsym {
            writer.reserve_null_dynamic_symbol_index();
            for _ in &symbols {
                writer.reserve_dynamic_symbol_index();
            }
            writer.reserve_dynsym();
        }
        let dynamic_count = 1
            + needed.len()
            + usize::from(rpath.is_some())
            + usize::from(runpath.is_some())
            + 2
            + if self.dynsym { 2 } else { 0 }
            + 1;
        let dynamic_offset = writer.reserved_len();
        writer.reserve_dynamic(dynamic_count);
        let dynamic_size = (writer.reserved_len() - dynamic_offset) as u64;
        let dynstr_offset = writer.reserved_len();
        writer.reserve_dynstr();
        let dynstr_size = (writer.reserved_len() - dynstr_offset) as u64;
        let rodata_offset = writer.reserve(self.rodata.len(), 1);
        writer.reserve_shstrtab();
        writer.reserve_section_headers();
        let file_size = writer.reserved_len() as u64;
        let align = if self.is_64 { 8 } else { 4 };

        writer
            .write_file_header(&FileHeader {
                os_abi: elf::ELFOSABI_SYSV,
                abi_version: 0,
                e_type: self.e_type,
                e_machine: self.machine,
                e_entry: 0,
                e_flags: 0,
            })
            .expect("file header");
        writer.write_align_program_headers();
        writer.write_program_header(&ProgramHeader {
            p_type: elf::PT_LOAD,
            p_flags: elf::PF_R,
            p_offset: 0,
            p_vaddr: 0,
            p_paddr: 0,
            p_filesz: file_size,
            p_memsz: file_size,
            p_align: align,
        });
        writer.write_program_header(&ProgramHeader {
            p_type: elf::PT_DYNAMIC,
            p_flags: elf::PF_R | elf::PF_W,
            p_offset: dynamic_offset as u64,
            p_vaddr: dynamic_offset as u64,
            p_paddr: dynamic_offset as u64,
            p_filesz: dynamic_size,
            p_memsz: dynamic_size,
            p_align: align,
        });

        if self.dynsym {
            writer.write_null_dynamic_symbol();
            for name in &symbols {
                writer.write_dynamic_symbol(&Sym {
                    name: Some(*name),
                    section: None,
                    st_info: (elf::STB_GLOBAL << 4) | elf::STT_FUNC,
                    st_other: elf::STV_DEFAULT,
                    st_shndx: elf::SHN_UNDEF,
                    st_value: 0,
                    st_size: 0,
                });
            }
        }

        writer.write_dynamic_string(elf::DT_SONAME, soname);
        for name in &needed {
            writer.write_dynamic_string(elf::DT_NEEDED, *name);
        }
        if let Some(dirs) = rpath {
            writer.write_dynamic_string(elf::DT_RPATH, dirs);
        }
        if let Some(dirs) = runpath {
            writer.write_dynamic_string(elf::DT_RUNPATH, dirs);
        }
        writer.write_dynamic(elf::DT_STRTAB, dynstr_offset as u64);
        writer.write_dynamic(elf::DT_STRSZ, dynstr_size);
        if self.dynsym {
            writer.write_dynamic(elf::DT_SYMTAB, dynsym_offset as u64);
            writer.write_dynamic(elf::DT_SYMENT, sym_size);
        }
        writer.write_dynamic(elf::DT_NULL, 0);

        writer.write_dynstr();
        writer.write(&self.rodata);
        writer.write_shstrtab();

        writer.write_null_section_header();
        if self.dynsym {
            writer.write_dynsym_section_header(dynsym_offset as u64, 1);
        }
        writer.write_dynamic_section_header(dynamic_offset as u64);
        writer.write_dynstr_section_header(dynstr_offset as u64);
        writer.write_section_header(&SectionHeader {
            name: Some(rodata_name),
            sh_type: elf::SHT_PROGBITS,
            sh_flags: elf::SHF_ALLOC.into(),
            sh_addr: rodata_offset as u64,
            sh_offset: rodata_offset as u64,
            sh_size: self.rodata.len() as u64,
            sh_link: 0,
            sh_info: 0,
            sh_addralign: 1,
            sh_entsize: 0,
        });
        writer.write_shstrtab_section_header();

        out
    }
}

/// Write an x86_64 core image whose `NT_FILE` note lists `files` in order.
pub fn write_core(path: &Path, files: &[&Path]) {
    let note = nt_file_note(files);

    let mut out = Vec::new();
    let mut writer = Writer::new(Endianness::Little, true, &mut out);
    writer.reserve_file_header();
    writer.reserve_program_headers(1);
    let note_offset = writer.reserve(note.len(), 4);

    writer
        .write_file_header(&FileHeader {
            os_abi: elf::ELFOSABI_SYSV,
            abi_version: 0,
            e_type: elf::ET_CORE,
            e_machine: EM_X86_64,
            e_entry: 0,
            e_flags: 0,
        })
        .expect("core header");
    writer.write_align_program_headers();
    writer.write_program_header(&ProgramHeader {
        p_type: elf::PT_NOTE,
        p_flags: 0,
        p_offset: note_offset as u64,
        p_vaddr: 0,
        p_paddr: 0,
        p_filesz: note.len() as u64,
        p_memsz: 0,
        p_align: 4,
    });
    writer.write(&note);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create core dir");
    }
    fs::write(path, out).expect("write core");
}

/// `CORE`/`NT_FILE` note: one page-sized mapping per file, spaced 1 MiB apart.
fn nt_file_note(files: &[&Path]) -> Vec<u8> {
    let mut desc = Vec::new();
    desc.extend_from_slice(&(files.len() as u64).to_le_bytes());
    desc.extend_from_slice(&4096u64.to_le_bytes());
    for idx in 0..files.len() {
        let start = 0x7f00_0000_0000u64 + (idx as u64) * 0x10_0000;
        desc.extend_from_slice(&start.to_le_bytes());
        desc.extend_from_slice(&(start + 0x1000).to_le_bytes());
        desc.extend_from_slice(&0u64.to_le_bytes());
    }
    for file in files {
        desc.extend_from_slice(file.as_os_str().as_bytes());
        desc.push(0);
    }

    let mut note = Vec::new();
    note.extend_from_slice(&5u32.to_le_bytes());
    note.extend_from_slice(&(desc.len() as u32).to_le_bytes());
    note.extend_from_slice(&NT_FILE.to_le_bytes());
    note.extend_from_slice(b"CORE\0\0\0\0");
    note.extend_from_slice(&desc);
    note.resize(note.len().next_multiple_of(4), 0);
    note
}
