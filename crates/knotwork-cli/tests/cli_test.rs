use assert_cmd::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn repo_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("expected crates/<name> layout")
        .to_path_buf()
}

fn fixture() -> PathBuf {
    let path = repo_root().join("fixtures").join("graphs").join("branch.json");
    assert!(path.exists(), "fixture missing: {}", path.display());
    path
}

fn run_json(args: &[&str]) -> Value {
    let exe = assert_cmd::cargo_bin!("knotwork-cli");
    let output = Command::new(exe).args(args).output().expect("run cli");
    assert!(
        output.status.success(),
        "cli failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn node<'a>(doc: &'a Value, id: &str) -> &'a Value {
    doc["nodes"]
        .as_array()
        .expect("nodes array")
        .iter()
        .find(|n| n["id"] == id)
        .expect("node present")
}

#[test]
fn check_reports_counts() {
    let path = fixture();
    let out = run_json(&["check", path.to_string_lossy().as_ref()]);
    assert_eq!(out["nodes"], 5);
    assert_eq!(out["links"], 3);
    assert_eq!(out["comments"], 1);
    assert_eq!(out["roots"][0], "begin");
}

#[test]
fn format_places_chain_left_to_right() {
    let path = fixture();
    let out = run_json(&[
        "format",
        "--root",
        "begin",
        "--no-knots",
        path.to_string_lossy().as_ref(),
    ]);

    let report = &out["report"];
    assert_eq!(report["root"], "begin");
    let formatted: Vec<&str> = report["formatted"]
        .as_array()
        .expect("formatted array")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    for id in ["begin", "print", "delay", "message"] {
        assert!(formatted.contains(&id), "{id} not formatted");
    }
    assert_eq!(report["commentBounds"][0]["comment"], "note");

    let doc = &out["document"];
    let x = |id: &str| node(doc, id)["position"]["x"].as_f64().expect("x");
    let y = |id: &str| node(doc, id)["position"]["y"].as_f64().expect("y");
    assert_eq!((x("begin"), y("begin")), (0.0, 8.0));
    assert!(x("print") > x("begin") + 160.0);
    assert!(x("delay") > x("print") + 160.0);
    assert_eq!(y("print"), y("begin"));
    assert!(y("message") >= y("print") + 96.0);
}

#[test]
fn format_reads_stdin() {
    let text = fs::read_to_string(fixture()).expect("read fixture");
    let exe = assert_cmd::cargo_bin!("knotwork-cli");
    assert_cmd::Command::new(exe)
        .args(["format", "--root", "begin", "-"])
        .write_stdin(text)
        .assert()
        .success();
}

#[test]
fn format_all_accepts_partial_config() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = tmp.path().join("layout.json");
    fs::write(&config, r#"{ "formatAllStyle": "smart", "padding": { "x": 80, "y": 60 } }"#)
        .expect("write config");

    let path = fixture();
    let out = run_json(&[
        "format-all",
        "--config",
        config.to_string_lossy().as_ref(),
        path.to_string_lossy().as_ref(),
    ]);
    assert_eq!(out["roots"][0], "begin");
}

#[test]
fn comment_root_exits_with_3() {
    let path = fixture();
    let exe = assert_cmd::cargo_bin!("knotwork-cli");
    Command::new(exe)
        .args(["format", "--root", "note", path.to_string_lossy().as_ref()])
        .assert()
        .code(3);
}

#[test]
fn unknown_flag_exits_with_2() {
    let exe = assert_cmd::cargo_bin!("knotwork-cli");
    Command::new(exe).args(["--bogus"]).assert().code(2);
}

#[test]
fn missing_input_exits_with_1() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let missing = tmp.path().join("missing.json");
    let exe = assert_cmd::cargo_bin!("knotwork-cli");
    Command::new(exe)
        .args(["check", missing.to_string_lossy().as_ref()])
        .assert()
        .code(1);
}
