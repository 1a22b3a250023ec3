//! CLI integration tests
//!
//! These tests run the compiled binary against temp directories. Nothing
//! here needs network access: probing is either disabled or pointed at a
//! closed local port.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const MANIFEST: &str = r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.example">
    <application android:debuggable="true">
        <receiver android:name="com.example.Boot">
            <intent-filter><action android:name="android.intent.action.BOOT_COMPLETED"/></intent-filter>
        </receiver>
        <meta-data android:name="com.google.android.geo.API_KEY" android:value="AIzaMeta"/>
    </application>
</manifest>"#;

const STRINGS: &str = r#"<resources>
    <string name="app_name">Example</string>
    <string name="firebase_database_url">http://127.0.0.1:1</string>
    <string name="stripe_api_key">sk_live_1</string>
</resources>"#;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn apk() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "resources/AndroidManifest.xml", MANIFEST);
    write(dir.path(), "resources/res/values/strings.xml", STRINGS);
    write(dir.path(), "resources/res/raw/keystore.bks", "binary");
    dir
}

/// Binary run from an empty working directory so no stray config is picked up
fn slicer(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("slicer").unwrap();
    cmd.current_dir(cwd).env("HOME", cwd).env("NO_COLOR", "1");
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_help() {
    let cwd = TempDir::new().unwrap();
    slicer(cwd.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dir"))
        .stdout(predicate::str::contains("--no-probe"));
}

#[test]
fn test_version() {
    let cwd = TempDir::new().unwrap();
    slicer(cwd.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_directory_argument() {
    let cwd = TempDir::new().unwrap();
    slicer(cwd.path())
        .arg("--no-banner")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No directory given"));
}

#[test]
fn test_nonexistent_directory() {
    let cwd = TempDir::new().unwrap();
    slicer(cwd.path())
        .args(["--no-banner", "-d", "does/not/exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a directory"));
}

// ============================================================================
// Scans
// ============================================================================

#[test]
fn test_offline_terminal_report() {
    let apk = apk();
    slicer(apk.path())
        .args(["--no-banner", "--no-probe", "-d"])
        .arg(apk.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Debuggable: true"))
        .stdout(predicate::str::contains("receiver:\n\tcom.example.Boot:"))
        .stdout(predicate::str::contains("\t- com.google.android.geo.API_KEY: AIzaMeta"))
        .stdout(predicate::str::contains("\t- stripe_api_key: sk_live_1"))
        .stdout(predicate::str::contains("(not probed)"))
        .stdout(predicate::str::contains("raw-files:\n\t- keystore.bks"));
}

#[test]
fn test_positional_directory() {
    let apk = apk();
    slicer(apk.path())
        .args(["--no-banner", "--no-probe"])
        .arg(apk.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Strings:"));
}

#[test]
fn test_unreachable_firebase_is_not_fatal() {
    let apk = apk();
    slicer(apk.path())
        .args(["--no-banner", "--timeout", "5", "-d"])
        .arg(apk.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("http://127.0.0.1:1/.json: Couldn't connect to Firebase"));
}

#[test]
fn test_json_report() {
    let apk = apk();
    let output = slicer(apk.path())
        .args(["--no-probe", "--format", "json", "-d"])
        .arg(apk.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["summary"]["exposed_components"], 1);
    assert_eq!(value["summary"]["unverified_secrets"], 1);
    assert_eq!(value["sections"][0]["type"], "manifest");
    assert_eq!(value["sections"][0]["manifest"]["debuggable"], "true");
}

#[test]
fn test_report_written_to_file() {
    let apk = apk();
    let out = apk.path().join("report.txt");
    slicer(apk.path())
        .args(["--no-banner", "--no-probe", "--output"])
        .arg(&out)
        .arg("-d")
        .arg(apk.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Report written to"));

    let text = fs::read_to_string(out).unwrap();
    assert!(text.contains("Backup allowed: true"));
}

#[test]
fn test_missing_strings_file_fails() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "resources/AndroidManifest.xml", MANIFEST);
    slicer(dir.path())
        .args(["--no-banner", "--no-probe", "-d"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_from_working_directory() {
    let apk = apk();
    write(
        apk.path(),
        "config.yml",
        "paths:\n  - path: resources/res/raw\n    kind: raw-files\n",
    );
    slicer(apk.path())
        .args(["--no-banner", "-d"])
        .arg(apk.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("raw-files:"))
        .stdout(predicate::str::contains("Strings:").not());
}

#[test]
fn test_explicit_toml_config() {
    let apk = apk();
    let config = apk.path().join("slicer.toml");
    fs::write(
        &config,
        "[[paths]]\npath = \"resources/AndroidManifest.xml\"\nkind = \"manifest\"\n",
    )
    .unwrap();
    slicer(apk.path())
        .args(["--no-banner", "--config"])
        .arg(&config)
        .arg("-d")
        .arg(apk.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Apikeys-in-manifest:"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let apk = apk();
    write(apk.path(), "config.yml", "paths:\n  - path: /etc/passwd\n    kind: strings\n");
    slicer(apk.path())
        .args(["--no-banner", "-d"])
        .arg(apk.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be relative"));
}

#[test]
fn test_zero_concurrency_is_rejected() {
    let apk = apk();
    slicer(apk.path())
        .args(["--no-banner", "--concurrency", "0", "-d"])
        .arg(apk.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency"));
}
