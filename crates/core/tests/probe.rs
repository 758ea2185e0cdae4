mod common;

use common::{ElfFixture, EM_386, EM_PPC, EM_PPC64};
use provenance_core::analysis::{probe_dlopen, probe_dynamic_symbol, Capability};
use provenance_core::ProvenanceError;
use tempfile::tempdir;

#[test]
fn dlopen_import_is_detected() {
    let tmp = tempdir().expect("tempdir");
    let exe = tmp.path().join("app");
    ElfFixture::executable().needs("libc.so.6").imports("puts").imports("dlopen").write(&exe);

    assert_eq!(probe_dlopen(&exe).expect("probe"), Capability::Imported);
    assert!(probe_dlopen(&exe).expect("probe").is_present());
}

#[test]
fn missing_import_is_reported_as_not_imported() {
    let tmp = tempdir().expect("tempdir");
    let exe = tmp.path().join("app");
    ElfFixture::executable().imports("puts").imports("dlopen_wrapper").imports("dlsym").write(&exe);

    assert_eq!(probe_dlopen(&exe).expect("probe"), Capability::NotImported);
    assert_eq!(probe_dynamic_symbol(&exe, "dlsym").expect("probe"), Capability::Imported);
}

#[test]
fn elf32_little_endian_imports_are_read() {
    let tmp = tempdir().expect("tempdir");
    let with = tmp.path().join("i386-dl");
    let without = tmp.path().join("i386-plain");
    ElfFixture::executable().elf32().machine(EM_386).imports("puts").imports("dlopen").write(&with);
    ElfFixture::executable().elf32().machine(EM_386).imports("puts").write(&without);

    assert_eq!(probe_dlopen(&with).expect("i386 dl"), Capability::Imported);
    assert_eq!(probe_dlopen(&without).expect("i386 plain"), Capability::NotImported);
}

#[test]
fn big_endian_imports_are_read() {
    let tmp = tempdir().expect("tempdir");
    let ppc64 = tmp.path().join("ppc64-dl");
    let ppc32 = tmp.path().join("ppc-dl");
    let plain = tmp.path().join("ppc64-plain");
    ElfFixture::executable().big_endian().machine(EM_PPC64).imports("dlopen").write(&ppc64);
    ElfFixture::executable()
        .elf32()
        .big_endian()
        .machine(EM_PPC)
        .imports("printf")
        .imports("dlopen")
        .write(&ppc32);
    ElfFixture::executable().big_endian().machine(EM_PPC64).imports("dlsym").write(&plain);

    assert_eq!(probe_dlopen(&ppc64).expect("ppc64"), Capability::Imported);
    assert_eq!(probe_dlopen(&ppc32).expect("ppc"), Capability::Imported);
    assert_eq!(probe_dlopen(&plain).expect("ppc64 plain"), Capability::NotImported);
    assert_eq!(probe_dynamic_symbol(&plain, "dlsym").expect("ppc64 dlsym"), Capability::Imported);
}

#[test]
fn absent_dynsym_is_not_an_error() {
    let tmp = tempdir().expect("tempdir");
    let exe = tmp.path().join("static-app");
    ElfFixture::executable().without_dynsym().write(&exe);

    let capability = probe_dlopen(&exe).expect("probe");
    assert_eq!(capability, Capability::NoDynamicSymbolTable);
    assert!(!capability.is_present());
}

#[test]
fn unreadable_executable_is_a_recoverable_error() {
    let tmp = tempdir().expect("tempdir");
    let missing = tmp.path().join("gone");

    match probe_dlopen(&missing) {
        Err(ProvenanceError::ExecutableUnreadable { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected ExecutableUnreadable, got {other:?}"),
    }
}

#[test]
fn non_elf_executable_is_malformed() {
    let tmp = tempdir().expect("tempdir");
    let script = tmp.path().join("script.sh");
    std::fs::write(&script, b"#!/bin/sh\necho hi\n").expect("write script");

    assert!(matches!(probe_dlopen(&script), Err(ProvenanceError::ExecutableMalformed { .. })));
}
