use std::fs;
use std::path::Path;

use provenance_core::analysis::MappingInput;
use provenance_core::model::DedupPolicy;
use so_provenance::commands::artifact_input;
use so_provenance::{
    canonicalize_or_current, load_config, load_structured, sha256_file, verbosity_directive,
};
use tempfile::tempdir;

#[test]
fn canonicalize_or_current_returns_cwd_for_dot() {
    let original = std::env::current_dir().expect("cwd");
    let tmp = tempdir().expect("tempdir");
    std::env::set_current_dir(tmp.path()).expect("chdir tmp");

    let result = canonicalize_or_current(".").expect("canonicalize").canonicalize().expect("canon");
    let expected = tmp.path().canonicalize().expect("canon tmp");
    assert_eq!(result, expected);

    std::env::set_current_dir(original).expect("restore cwd");
}

#[test]
fn canonicalize_or_current_keeps_missing_paths_absolute() {
    let result = canonicalize_or_current("definitely/not/here").expect("canonicalize");
    assert!(result.is_absolute());
    assert!(result.ends_with("definitely/not/here"));
}

#[test]
fn sha256_file_matches_known_digest() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("blob");
    fs::write(&path, b"abc").expect("write");
    assert_eq!(
        sha256_file(&path).expect("hash"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn config_loads_from_json_and_yaml() {
    let tmp = tempdir().expect("tempdir");
    let json = tmp.path().join("cfg.json");
    fs::write(&json, r#"{"dedup":"collapse","search":{"library_path":["/opt/lib"]}}"#)
        .expect("write json");
    let yaml = tmp.path().join("cfg.yaml");
    fs::write(&yaml, "dedup: collapse\nsearch:\n  library_path: [/opt/lib]\n").expect("write yaml");

    let from_json = load_config(Some(&json)).expect("json config");
    let from_yaml = load_config(Some(&yaml)).expect("yaml config");
    assert_eq!(from_json, from_yaml);
    assert_eq!(from_json.dedup, DedupPolicy::Collapse);
    assert_eq!(load_config(None).expect("default"), Default::default());
}

#[test]
fn load_structured_reports_parse_errors() {
    let tmp = tempdir().expect("tempdir");
    let bad = tmp.path().join("bad.json");
    fs::write(&bad, "{ nope").expect("write");
    let err = load_structured::<serde_json::Value>(&bad, "batch manifest").unwrap_err();
    assert!(err.to_string().contains("Failed to parse batch manifest JSON"), "{err}");
}

#[test]
fn verbosity_maps_to_filter_directives() {
    assert_eq!(verbosity_directive(0), None);
    assert_eq!(verbosity_directive(1), Some("info"));
    assert_eq!(verbosity_directive(2), Some("debug"));
    assert_eq!(verbosity_directive(7), Some("trace"));
}

#[test]
fn artifact_input_requires_exactly_one_mapping_source() {
    let exe = Path::new("/usr/bin/app");
    let err = artifact_input(exe, None, None).unwrap_err();
    assert!(err.to_string().contains("required"));
    let err = artifact_input(exe, Some(Path::new("core")), Some(Path::new("maps"))).unwrap_err();
    assert!(err.to_string().contains("not both"));
}

#[test]
fn artifact_input_reads_mapping_lists() {
    let tmp = tempdir().expect("tempdir");
    let maps = tmp.path().join("maps.txt");
    fs::write(&maps, "/lib/liba.so\n/usr/bin/app\n/lib/liba.so\n/opt/libb.so\n").expect("write");

    let input = artifact_input(Path::new("/usr/bin/app"), None, Some(&maps)).expect("input");
    assert_eq!(
        input.mappings,
        MappingInput::Listed(vec!["/lib/liba.so".into(), "/opt/libb.so".into()])
    );
}
