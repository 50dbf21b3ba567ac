use assert_cmd::Command;
use serde_json::Value;
use std::path::{Path, PathBuf};

const FIXTURE: &str = "tests/fixtures/player.yaml";

/// Binary with an isolated config and settings location.
fn overlay_dimmer(scratch: &Path) -> Command {
    let mut cmd = Command::cargo_bin("overlay-dimmer").expect("overlay-dimmer binary");
    cmd.env_remove("RUST_LOG")
        .env_remove("OVERLAY_DIMMER_LOG")
        .env_remove("OVERLAY_DIMMER_HOVER_MODE")
        .env("OVERLAY_DIMMER_SETTINGS", scratch.join("settings.json"))
        .args(["--config"])
        .arg(scratch.join("absent.yaml"))
        .args(["--log-level", "warn"]);
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    let stdout = String::from_utf8(output.stdout.clone()).expect("utf8 output");
    serde_json::from_str(&stdout).expect("valid json")
}

fn fixture_path() -> PathBuf {
    let path = PathBuf::from(FIXTURE);
    assert!(path.exists(), "fixture missing");
    path
}

#[test]
fn css_renders_requested_opacity_with_hover_override() {
    let scratch = tempfile::tempdir().unwrap();
    let assert = overlay_dimmer(scratch.path())
        .args(["css", "--opacity", "0.5"])
        .assert()
        .success();
    let css = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(css.contains("[data-overlay-dimmed=\"true\"]"));
    assert!(css.contains("opacity: 0.5 !important"));
    assert!(css.contains(":hover"));
}

#[test]
fn css_rejects_non_numeric_opacity() {
    let scratch = tempfile::tempdir().unwrap();
    overlay_dimmer(scratch.path())
        .args(["css", "--opacity", "NaN"])
        .assert()
        .failure();
}

#[test]
fn settings_set_then_show_round_trips_through_the_file() {
    let scratch = tempfile::tempdir().unwrap();
    overlay_dimmer(scratch.path())
        .args(["settings", "set", "--enabled", "false", "--opacity", "0.65"])
        .assert()
        .success();

    let raw = std::fs::read_to_string(scratch.path().join("settings.json")).unwrap();
    let stored: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored["enabled"], Value::Bool(false));
    assert_eq!(stored["opacity"].as_f64(), Some(0.65));

    let assert = overlay_dimmer(scratch.path())
        .args(["settings", "show"])
        .assert()
        .success();
    let human = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(human.contains("Dimming: disabled"));
    assert!(human.contains("Opacity: 65% (More/Less Transparent)"));
}

#[test]
fn settings_set_requires_a_change() {
    let scratch = tempfile::tempdir().unwrap();
    overlay_dimmer(scratch.path())
        .args(["settings", "set"])
        .assert()
        .failure();
    assert!(!scratch.path().join("settings.json").exists());
}

#[test]
fn scan_reports_dimmed_elements_and_effective_opacity() {
    let scratch = tempfile::tempdir().unwrap();
    let assert = overlay_dimmer(scratch.path())
        .args(["--output", "json", "scan", "--fixture"])
        .arg(fixture_path())
        .assert()
        .success();
    let value = stdout_json(assert.get_output());

    assert_eq!(value["report"]["candidates"].as_u64(), Some(3));
    assert_eq!(value["report"]["rejected"].as_u64(), Some(2));
    let elements = value["elements"].as_array().unwrap();
    assert_eq!(elements.len(), 1);
    assert_eq!(
        elements[0]["element"].as_str(),
        Some("div#card-1.ytp-ce-element.ytp-ce-element-show")
    );
    assert_eq!(elements[0]["opacity"].as_f64(), Some(0.3));
    assert!(!scratch.path().join("settings.json").exists());
}

#[test]
fn scan_with_opacity_and_mutations_tracks_the_timeline() {
    let scratch = tempfile::tempdir().unwrap();
    let assert = overlay_dimmer(scratch.path())
        .args(["-o", "json", "scan", "--opacity", "0.6", "--apply-mutations", "--fixture"])
        .arg(fixture_path())
        .assert()
        .success();
    let value = stdout_json(assert.get_output());

    assert_eq!(value["opacity"].as_f64(), Some(0.6));
    assert_eq!(value["report"]["pruned"].as_u64(), Some(1));
    let elements = value["elements"].as_array().unwrap();
    assert_eq!(elements.len(), 1);
    assert!(elements[0]["element"]
        .as_str()
        .unwrap()
        .starts_with("div#card-late"));
    assert_eq!(elements[0]["opacity"].as_f64(), Some(0.6));
}

#[test]
fn serve_answers_commands_and_persists_changes() {
    let scratch = tempfile::tempdir().unwrap();
    let input = concat!(
        "{\"action\":\"getStatus\"}\n",
        "{\"action\":\"setOpacity\",\"opacity\":0.6}\n",
        "not json\n",
        "{\"action\":\"toggleEnabled\",\"enabled\":false}\n",
    );
    let assert = overlay_dimmer(scratch.path())
        .args(["serve", "--no-mutations", "--fixture"])
        .arg(fixture_path())
        .write_stdin(input)
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let replies: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("json reply"))
        .collect();
    assert_eq!(replies.len(), 4);
    assert_eq!(replies[0]["enabled"], Value::Bool(true));
    assert_eq!(replies[0]["opacity"].as_f64(), Some(0.3));
    assert_eq!(replies[1]["success"], Value::Bool(true));
    assert_eq!(replies[1]["opacity"].as_f64(), Some(0.6));
    assert_eq!(replies[2]["success"], Value::Bool(false));
    assert_eq!(replies[3]["enabled"], Value::Bool(false));

    let raw = std::fs::read_to_string(scratch.path().join("settings.json")).unwrap();
    let stored: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored["enabled"], Value::Bool(false));
    assert_eq!(stored["opacity"].as_f64(), Some(0.6));
}

#[test]
fn info_reports_build_metadata() {
    let scratch = tempfile::tempdir().unwrap();
    let assert = overlay_dimmer(scratch.path())
        .args(["-o", "json", "info"])
        .assert()
        .success();
    let value = stdout_json(assert.get_output());
    assert_eq!(
        value["build"]["version"].as_str(),
        Some(env!("CARGO_PKG_VERSION"))
    );
    assert_eq!(value["profile"].as_str(), Some("video-player"));
    assert!(value["settings_path"]
        .as_str()
        .unwrap()
        .ends_with("settings.json"));
}
