//! Integration tests for the metascan CLI.
//!
//! Run with: `cargo test --package metascan-cli --test cli_integration`

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use metascan_ops::test_fixtures::{write_jar, ClassFileWriter, ElementValue};
use tempfile::TempDir;

/// Run metascan inside `dir` with an isolated settings file.
fn run_metascan(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_metascan"))
        .current_dir(dir)
        .env_remove("METASCAN_THREADS")
        .env_remove("METASCAN_FORMAT")
        .env_remove("METASCAN_INCLUDE")
        .env_remove("METASCAN_EXCLUDE")
        .env("METASCAN_SETTINGS", dir.join("settings.json"))
        .args(args)
        .output()
        .expect("Failed to execute metascan command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Lay out a class directory and a jar with a small hierarchy.
fn create_classpath(dir: &Path) -> (PathBuf, PathBuf) {
    let classes = dir.join("classes");
    ClassFileWriter::new("com/acme/Service")
        .access_flags(0x0601)
        .write_to_dir(&classes)
        .unwrap();
    ClassFileWriter::new("com/acme/OrderService")
        .interface("com/acme/Service")
        .annotation(
            "com/acme/Component",
            vec![("value", ElementValue::Str("orders".into()))],
        )
        .write_to_dir(&classes)
        .unwrap();
    ClassFileWriter::new("com/acme/internal/Audit")
        .interface("com/acme/Service")
        .write_to_dir(&classes)
        .unwrap();

    let lib = dir.join("lib");
    fs::create_dir_all(&lib).unwrap();
    let jar = lib.join("ext.jar");
    write_jar(
        &jar,
        &[ClassFileWriter::new("ext/FastOrderService").superclass("com/acme/OrderService")],
        &[],
    )
    .unwrap();

    (classes, jar)
}

#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    let output = run_metascan(dir.path(), &["--help"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("scan"));
    assert!(out.contains("query"));
    assert!(out.contains("config"));
}

#[test]
fn test_scan_then_query() {
    let dir = TempDir::new().unwrap();
    let (classes, jar) = create_classpath(dir.path());
    let index = dir.path().join("index.xml");

    let output = run_metascan(
        dir.path(),
        &[
            "scan",
            classes.to_str().unwrap(),
            jar.to_str().unwrap(),
            "-j",
            "2",
            "-o",
            index.to_str().unwrap(),
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Classes:      4"));
    assert!(index.exists());

    let output = run_metascan(
        dir.path(),
        &["query", "index.xml", "SubTypes", "com.acme.Service", "--transitive"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let lines: Vec<String> = stdout(&output).lines().map(String::from).collect();
    assert_eq!(
        lines,
        vec![
            "com.acme.OrderService",
            "com.acme.internal.Audit",
            "ext.FastOrderService"
        ]
    );

    let output = run_metascan(
        dir.path(),
        &["query", "index.xml", "TypeAnnotations", "com.acme.OrderService", "--reverse"],
    );
    assert_eq!(stdout(&output).trim(), "com.acme.Component");
}

#[test]
fn test_scan_with_exclude_and_json() {
    let dir = TempDir::new().unwrap();
    create_classpath(dir.path());

    let output = run_metascan(
        dir.path(),
        &[
            "scan",
            "classes",
            "--lib-dir",
            "lib",
            "--exclude",
            "com.acme.internal",
            "-o",
            "out/index.json",
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let contents = fs::read_to_string(dir.path().join("out/index.json")).unwrap();
    assert!(contents.contains("\"SubTypes\""));
    assert!(!contents.contains("com.acme.internal.Audit"));

    let output = run_metascan(dir.path(), &["stats", "out/index.json"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Format:   json"));
}

#[test]
fn test_unreadable_input_is_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    let (classes, _) = create_classpath(dir.path());
    fs::write(dir.path().join("broken.jar"), b"not a zip").unwrap();

    let output = run_metascan(
        dir.path(),
        &["scan", classes.to_str().unwrap(), "broken.jar"],
    );
    assert!(output.status.success());
    let err = stderr(&output);
    assert!(err.contains("[input-unreadable] broken.jar"));
    assert_eq!(err.lines().filter(|l| l.contains("broken.jar")).count(), 1);

    let output = run_metascan(
        dir.path(),
        &["scan", classes.to_str().unwrap(), "broken.jar", "--strict"],
    );
    assert!(!output.status.success());
}

#[test]
fn test_scan_without_locations_fails() {
    let dir = TempDir::new().unwrap();
    let output = run_metascan(dir.path(), &["scan"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Nothing to scan"));
}

#[test]
fn test_query_unknown_index() {
    let dir = TempDir::new().unwrap();
    let (classes, _) = create_classpath(dir.path());
    run_metascan(
        dir.path(),
        &["scan", classes.to_str().unwrap(), "-o", "index.xml"],
    );

    let output = run_metascan(dir.path(), &["query", "index.xml", "Methods", "x"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Index Methods not found"));
}

#[test]
fn test_query_reference_index_without_entries() {
    let dir = TempDir::new().unwrap();
    let classes = dir.path().join("classes");
    ClassFileWriter::new("plain/Base").write_to_dir(&classes).unwrap();
    ClassFileWriter::new("plain/Impl")
        .superclass("plain/Base")
        .write_to_dir(&classes)
        .unwrap();
    let output = run_metascan(
        dir.path(),
        &["scan", classes.to_str().unwrap(), "-o", "index.xml"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let output = run_metascan(
        dir.path(),
        &["query", "index.xml", "TypeAnnotations", "plain.Marker"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).trim().is_empty());
}

#[test]
fn test_config_round_trip() {
    let dir = TempDir::new().unwrap();

    let output = run_metascan(dir.path(), &["config", "set", "format", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(dir.path().join("settings.json").exists());

    let output = run_metascan(dir.path(), &["config", "get", "format"]);
    assert_eq!(stdout(&output).trim(), "json");

    let output = run_metascan(dir.path(), &["config", "set", "colour", "blue"]);
    assert!(!output.status.success());

    let output = run_metascan(dir.path(), &["config", "path"]);
    assert!(stdout(&output).trim().ends_with("settings.json"));

    let output = run_metascan(dir.path(), &["config", "reset"]);
    assert!(output.status.success());
    let output = run_metascan(dir.path(), &["config", "get", "format"]);
    assert_eq!(stdout(&output).trim(), "xml");
}

#[test]
fn test_env_override_applies_to_scan_format() {
    let dir = TempDir::new().unwrap();
    let (classes, _) = create_classpath(dir.path());

    let output = Command::new(env!("CARGO_BIN_EXE_metascan"))
        .current_dir(dir.path())
        .env("METASCAN_SETTINGS", dir.path().join("settings.json"))
        .env("METASCAN_FORMAT", "json")
        .args(["scan", classes.to_str().unwrap(), "-o", "index.out"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let contents = fs::read_to_string(dir.path().join("index.out")).unwrap();
    assert!(contents.trim_start().starts_with('{'));
}
