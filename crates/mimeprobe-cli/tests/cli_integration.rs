use std::io::Write;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR";

const KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2"><Document/></kml>"#;

const CUSTOM_CONFIG: &str = r#"
[[signature]]
id = "foo-text"
kind = "bytes"
mime_type = "application/x-foo"
format_version = "3"
content = "FOOB"
"#;

/// Runs in `dir` so a stray `mimeprobe.toml` elsewhere is never picked up.
fn mimeprobe(dir: &Path) -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mimeprobe");
    cmd.current_dir(dir).env("NO_COLOR", "1").env_remove("MIMEPROBE_LOG");
    cmd
}

fn fixture_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("logo.png"), PNG).unwrap();
    std::fs::write(dir.path().join("places.kml"), KML).unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    std::fs::write(dir.path().join("nested").join("doc.pdf"), b"%PDF-1.7\n").unwrap();
    dir
}

fn jar_bytes() -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("META-INF/MANIFEST.MF", options).unwrap();
    writer
        .write_all(b"Manifest-Version: 1.0\r\nMain-Class: org.example.Main\r\n\r\n")
        .unwrap();
    writer.start_file("org/example/Main.class", options).unwrap();
    writer.write_all(b"\xCA\xFE\xBA\xBE").unwrap();
    writer.finish().unwrap().into_inner()
}

fn detect_json(dir: &Path, args: &[&str]) -> serde_json::Value {
    let output = mimeprobe(dir)
        .arg("detect")
        .args(args)
        .args(["--format", "json"])
        .output()
        .unwrap();
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "invalid JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

// ============================================================================
// detect
// ============================================================================

#[test]
fn test_detect_text_output() {
    let dir = fixture_dir();
    mimeprobe(dir.path())
        .args(["detect", "logo.png", "places.kml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("logo.png: image/png [png]"))
        .stdout(predicate::str::contains(
            "places.kml: application/vnd.google-earth.kml+xml (version 2.2) [kml]",
        ));
}

#[test]
fn test_detect_json_output() {
    let dir = fixture_dir();
    let json = detect_json(dir.path(), &["places.kml"]);

    let entries = json.as_array().expect("array of entries");
    assert_eq!(entries.len(), 1);
    let detection = &entries[0]["detection"];
    assert_eq!(detection["mime_type"], "application/vnd.google-earth.kml+xml");
    assert_eq!(detection["format_version"], "2.2");
    assert_eq!(detection["signature"], "kml");
    assert_eq!(detection["source"], "signature");
    assert!(entries[0].get("error").is_none());
}

#[test]
fn test_detect_content_beats_extension() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("plugin.zip"), jar_bytes()).unwrap();

    let json = detect_json(dir.path(), &["plugin.zip"]);
    assert_eq!(json[0]["detection"]["signature"], "jar");
    assert_eq!(json[0]["detection"]["mime_type"], "application/java-archive");
    assert_eq!(json[0]["detection"]["host_hint"], "application/zip");
}

#[test]
fn test_detect_recursive_walks_directory() {
    let dir = fixture_dir();
    let json = detect_json(dir.path(), &["--recursive", "."]);

    let signatures: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["detection"]["signature"].as_str().unwrap())
        .collect();
    assert_eq!(signatures.len(), 3);
    assert!(signatures.contains(&"png"));
    assert!(signatures.contains(&"kml"));
    assert!(signatures.contains(&"pdf"));
}

#[test]
fn test_detect_directory_without_recursive_is_an_error_entry() {
    let dir = fixture_dir();
    mimeprobe(dir.path())
        .args(["detect", "nested"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("is a directory"));
}

#[test]
fn test_detect_missing_file_reports_error_and_continues() {
    let dir = fixture_dir();
    mimeprobe(dir.path())
        .args(["detect", "logo.png", "does-not-exist.bin"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("logo.png: image/png"))
        .stdout(predicate::str::contains("does-not-exist.bin: error"));
}

#[test]
fn test_detect_unknown_content() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("blob"), [0x42u8; 64]).unwrap();

    let json = detect_json(dir.path(), &["blob"]);
    assert_eq!(json[0]["detection"]["mime_type"], "application/octet-stream");
    assert_eq!(json[0]["detection"]["source"], "unknown");
}

#[test]
fn test_detect_requires_a_path() {
    let dir = tempfile::tempdir().unwrap();
    mimeprobe(dir.path()).arg("detect").assert().failure();
}

// ============================================================================
// is-type
// ============================================================================

#[test]
fn test_is_type_exit_codes() {
    let dir = fixture_dir();
    mimeprobe(dir.path())
        .args(["is-type", "logo.png", "image/png"])
        .assert()
        .code(0);
    mimeprobe(dir.path())
        .args(["is-type", "logo.png", "image/gif"])
        .assert()
        .code(1);
}

#[test]
fn test_is_type_ignores_parameters() {
    let dir = fixture_dir();
    mimeprobe(dir.path())
        .args([
            "is-type",
            "places.kml",
            "application/vnd.google-earth.kml+xml; charset=utf-8",
        ])
        .assert()
        .code(0);
}

#[test]
fn test_is_type_rejects_invalid_mime_type() {
    let dir = fixture_dir();
    mimeprobe(dir.path())
        .args(["is-type", "logo.png", "not a type"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("is not a MIME type"));
}

#[test]
fn test_is_type_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    mimeprobe(dir.path())
        .args(["is-type", "gone.png", "image/png"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("gone.png"));
}

// ============================================================================
// list / schema
// ============================================================================

#[test]
fn test_list_text() {
    let dir = tempfile::tempdir().unwrap();
    mimeprobe(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("odf-text"))
        .stdout(predicate::str::contains("gpx-1.1"))
        .stdout(predicate::str::contains("hints: any"))
        .stdout(predicate::str::contains("signatures"));
}

#[test]
fn test_list_help_describes_registration_order() {
    let dir = tempfile::tempdir().unwrap();
    mimeprobe(dir.path())
        .args(["list", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("registration order"))
        .stdout(predicate::str::contains("order they are tried").not());
}

#[test]
fn test_list_json_preserves_registration_order() {
    let dir = tempfile::tempdir().unwrap();
    let output = mimeprobe(dir.path())
        .args(["list", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.first(), Some(&"odf-text"));
    let pos = |id: &str| ids.iter().position(|i| *i == id).unwrap();
    assert!(pos("jar") < pos("zip"));
    assert!(pos("kml") < pos("xml"));

    let gif = rows
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["id"] == "gif89a")
        .unwrap();
    assert_eq!(gif["format_version"], "89a");
    assert_eq!(gif["hints"].as_array().unwrap().len(), 0);
}

#[test]
fn test_schema_is_json() {
    let dir = tempfile::tempdir().unwrap();
    let output = mimeprobe(dir.path()).arg("schema").output().unwrap();
    assert!(output.status.success());

    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let properties = &schema["properties"];
    assert!(properties.get("builtin_signatures").is_some());
    assert!(properties.get("signature").is_some());
    assert!(properties.get("exclude").is_some());
}

// ============================================================================
// configuration
// ============================================================================

#[test]
fn test_explicit_config_adds_signature() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("custom.toml");
    std::fs::write(&config, CUSTOM_CONFIG).unwrap();
    std::fs::write(dir.path().join("sample.foo"), b"FOOBAR").unwrap();

    mimeprobe(dir.path())
        .args(["--config", config.to_str().unwrap(), "detect", "sample.foo"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "sample.foo: application/x-foo (version 3) [foo-text]",
        ));
}

#[test]
fn test_implicit_config_in_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("mimeprobe.toml"), CUSTOM_CONFIG).unwrap();
    std::fs::write(dir.path().join("sample.foo"), b"FOOBAR").unwrap();

    mimeprobe(dir.path())
        .args(["is-type", "sample.foo", "application/x-foo"])
        .assert()
        .code(0);
}

#[test]
fn test_broken_implicit_config_falls_back_with_warning() {
    let dir = fixture_dir();
    std::fs::write(dir.path().join("mimeprobe.toml"), "builtin_signatures = [").unwrap();

    mimeprobe(dir.path())
        .args(["detect", "logo.png"])
        .assert()
        .success()
        .stdout(predicate::str::contains("image/png [png]"))
        .stderr(predicate::str::contains("using defaults"));
}

#[test]
fn test_broken_explicit_config_is_fatal() {
    let dir = fixture_dir();
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "builtin_signatures = [").unwrap();

    mimeprobe(dir.path())
        .args(["--config", config.to_str().unwrap(), "detect", "logo.png"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error:"))
        .stderr(predicate::str::contains("bad.toml"));
}

#[test]
fn test_invalid_signature_in_config_is_fatal() {
    let dir = fixture_dir();
    let config = dir.path().join("invalid.toml");
    std::fs::write(
        &config,
        r#"
[[signature]]
id = "both"
kind = "bytes"
mime_type = "application/x-both"
content = "AB"
hex = "4142"
"#,
    )
    .unwrap();

    mimeprobe(dir.path())
        .args(["--config", config.to_str().unwrap(), "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid signature"));
}

#[test]
fn test_validation_warnings_go_to_stderr() {
    let dir = fixture_dir();
    std::fs::write(
        dir.path().join("mimeprobe.toml"),
        "disabled_signatures = [\"no-such-signature\"]\n",
    )
    .unwrap();

    mimeprobe(dir.path())
        .args(["detect", "logo.png"])
        .assert()
        .success()
        .stderr(predicate::str::contains("no-such-signature"));
}

#[test]
fn test_no_builtin_falls_back_to_host_hint() {
    let dir = fixture_dir();
    mimeprobe(dir.path())
        .args(["--no-builtin", "detect", "logo.png"])
        .assert()
        .success()
        .stdout(predicate::str::contains("logo.png: image/png [host hint]"));

    mimeprobe(dir.path())
        .args(["--no-builtin", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 signatures"));
}

#[test]
fn test_log_env_enables_debug_output() {
    let dir = fixture_dir();
    mimeprobe(dir.path())
        .env("MIMEPROBE_LOG", "debug")
        .args(["detect", "logo.png"])
        .assert()
        .success()
        .stderr(predicate::str::contains("registry ready"));
}
