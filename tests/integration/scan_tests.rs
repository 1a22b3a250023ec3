//! End-to-end scans over decompiled APK layouts built in a temp directory

mod support;

use slicer::config::{Config, PathEntry, PathKind};
use slicer::probe::Verdict;
use slicer::report::TerminalReporter;
use slicer::scan::{never_cancel, ScanError, ScanOptions, ScanReport, Scanner, SecretFinding, Section};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use support::{serve, Reply};
use tempfile::TempDir;
use tokio::sync::watch;

const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.example">
    <application android:allowBackup="true">
        <activity android:name="com.example.MainActivity" android:exported="true">
            <intent-filter>
                <action android:name="android.intent.action.MAIN"/>
                <category android:name="android.intent.category.LAUNCHER"/>
            </intent-filter>
        </activity>
        <service android:name="com.example.Sync"/>
    </application>
</manifest>"#;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// A jadx-style output directory with a manifest and the given strings.xml
fn apk(strings: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "resources/AndroidManifest.xml", MANIFEST);
    write(dir.path(), "resources/res/values/strings.xml", strings);
    dir
}

fn offline() -> ScanOptions {
    ScanOptions {
        probe: false,
        extract_urls: false,
    }
}

async fn scan(dir: &Path, config: Config, options: ScanOptions) -> Result<ScanReport, ScanError> {
    Scanner::new(config, options).unwrap().scan(dir, never_cancel()).await
}

fn render(report: &ScanReport) -> String {
    colored::control::set_override(false);
    TerminalReporter::new(None).render(report)
}

// ============================================================================
// Default layout
// ============================================================================

#[tokio::test]
async fn test_default_layout_sections_in_config_order() {
    let dir = apk(r#"<resources><string name="app_name">Example</string></resources>"#);
    write(dir.path(), "resources/res/xml/network_security_config.xml", "<network-security-config/>");
    write(dir.path(), "resources/res/xml/file_paths.xml", "<paths/>");

    let report = scan(dir.path(), Config::default(), offline()).await.unwrap();

    assert!(!report.cancelled);
    assert_eq!(report.sections.len(), 4);
    assert!(matches!(report.sections[0], Section::Manifest { .. }));
    assert!(matches!(report.sections[1], Section::Strings { .. }));
    match &report.sections[2] {
        Section::Listing { kind, files, .. } => {
            assert_eq!(*kind, PathKind::XmlFiles);
            assert_eq!(files, &vec!["file_paths.xml".to_string(), "network_security_config.xml".to_string()]);
        }
        other => panic!("expected a listing, got {:?}", other),
    }
    // res/raw is optional and absent
    assert!(matches!(report.sections[3], Section::Skipped { .. }));

    let text = render(&report);
    assert!(text.contains("activity:\n\tcom.example.MainActivity:\n\tPermission: null\n"));
    assert!(text.contains("\t\t- action: android.intent.action.MAIN\n"));
    assert!(!text.contains("com.example.Sync"));
    assert!(text.contains("XML-files:\n\t- file_paths.xml\n\t- network_security_config.xml\n"));
    assert!(text.contains("not found, skipped"));
}

#[tokio::test]
async fn test_scan_twice_gives_same_report() {
    let dir = apk(r#"<resources><string name="stripe_api_key">sk_live_1</string></resources>"#);
    let scanner = Scanner::new(Config::default(), offline()).unwrap();

    let first = scanner.scan(dir.path(), never_cancel()).await.unwrap();
    let second = scanner.scan(dir.path(), never_cancel()).await.unwrap();
    assert_eq!(first.sections, second.sections);
}

// ============================================================================
// Fatal input errors
// ============================================================================

#[tokio::test]
async fn test_missing_required_path_is_fatal() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "resources/AndroidManifest.xml", MANIFEST);

    let err = scan(dir.path(), Config::default(), offline()).await.unwrap_err();
    assert!(matches!(err, ScanError::MissingPath { .. }));
    assert!(err.to_string().contains("strings.xml"));
}

#[tokio::test]
async fn test_malformed_xml_is_fatal() {
    let dir = apk("<resources><string name=\"a\">unterminated</resources>");
    let err = scan(dir.path(), Config::default(), offline()).await.unwrap_err();
    assert!(matches!(err, ScanError::Document { .. }));
}

#[tokio::test]
async fn test_text_around_root_is_fatal() {
    let dir = apk(r#"garbage <resources><string name="a">b</string></resources> junk"#);
    let err = scan(dir.path(), Config::default(), offline()).await.unwrap_err();
    assert!(matches!(err, ScanError::Document { .. }));
}

#[tokio::test]
async fn test_unexpected_root_is_fatal() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "layout.xml", "<LinearLayout/>");
    let config = Config {
        paths: vec![PathEntry::new("layout.xml", PathKind::Strings)],
        ..Config::default()
    };

    let err = scan(dir.path(), config, offline()).await.unwrap_err();
    assert!(matches!(err, ScanError::UnexpectedRoot { ref root, .. } if root == "LinearLayout"));
}

#[tokio::test]
async fn test_root_must_be_a_directory() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "file.txt", "x");
    let err = scan(&dir.path().join("file.txt"), Config::default(), offline())
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::NotADirectory(_)));
}

#[tokio::test]
async fn test_listing_kind_requires_directory() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "raw", "not a directory");
    let config = Config {
        paths: vec![PathEntry::new("raw", PathKind::RawFiles)],
        ..Config::default()
    };

    let err = scan(dir.path(), config, offline()).await.unwrap_err();
    assert!(matches!(err, ScanError::WrongPathType { expected: "directory", .. }));
}

// ============================================================================
// Dispatch by root element
// ============================================================================

#[tokio::test]
async fn test_documents_dispatch_on_root_element() {
    // Kinds are swapped on purpose; the root element decides
    let dir = apk(r#"<resources><string name="google_api_key">AIza</string></resources>"#);
    let config = Config {
        paths: vec![
            PathEntry::new("resources/res/values/strings.xml", PathKind::Manifest),
            PathEntry::new("resources/AndroidManifest.xml", PathKind::Strings),
        ],
        ..Config::default()
    };

    let report = scan(dir.path(), config, offline()).await.unwrap();
    assert!(matches!(report.sections[0], Section::Strings { .. }));
    assert!(matches!(report.sections[1], Section::Manifest { .. }));
}

// ============================================================================
// Secrets
// ============================================================================

#[tokio::test]
async fn test_offline_strings_in_declaration_order() {
    let dir = apk(
        r#"<resources>
            <string name="stripe_api_key">sk_live_1</string>
            <string name="abc_capital_on">ON</string>
            <string name="google_api_key">AIzaKey</string>
            <string name="firebase_database_url">https://x.firebaseio.com</string>
            <string name="another_api_key"></string>
            <string name="Maps_API_Key">m</string>
        </resources>"#,
    );

    let report = scan(dir.path(), Config::default(), offline()).await.unwrap();
    let Section::Strings { strings, .. } = &report.sections[1] else {
        panic!("expected strings section");
    };

    let names: Vec<&str> = strings
        .findings
        .iter()
        .map(|f| match f {
            SecretFinding::Probe(r) => r.candidate.resource_name.as_str(),
            SecretFinding::Unverified(c) => c.resource_name.as_str(),
        })
        .collect();
    // One Google entry per default endpoint
    assert_eq!(
        names,
        vec![
            "stripe_api_key",
            "google_api_key",
            "google_api_key",
            "google_api_key",
            "google_api_key",
            "google_api_key",
            "firebase_database_url",
            "Maps_API_Key",
        ]
    );

    let text = render(&report);
    assert!(text.contains("\t- stripe_api_key: sk_live_1\n"));
    assert_eq!(text.matches("google_api_key: AIzaKey (not probed)").count(), 1);
    assert!(text.contains("firebase_database_url: https://x.firebaseio.com (not probed)"));
    assert!(!text.contains("abc_capital_on"));
    assert!(!text.contains("another_api_key"));
}

#[tokio::test]
async fn test_live_verification_end_to_end() {
    let addr = serve(|path| {
        if path == "/.json" {
            Reply::new(200, "{}")
        } else {
            Reply::new(403, "")
        }
    })
    .await;
    let base = format!("http://{}", addr);

    let dir = apk(&format!(
        r#"<resources>
            <string name="firebase_database_url">{}</string>
            <string name="google_api_key">AIzaRestricted</string>
        </resources>"#,
        base
    ));
    let config = Config {
        urls: vec![format!("{}/maps?key=", base)],
        ..Config::default()
    };

    let report = scan(dir.path(), config, ScanOptions::default()).await.unwrap();
    let Section::Strings { strings, .. } = &report.sections[1] else {
        panic!("expected strings section");
    };
    let verdicts: Vec<Verdict> = strings
        .findings
        .iter()
        .filter_map(|f| match f {
            SecretFinding::Probe(r) => Some(r.verdict),
            SecretFinding::Unverified(_) => None,
        })
        .collect();
    assert_eq!(verdicts, vec![Verdict::Exposed, Verdict::Protected]);

    let text = render(&report);
    assert!(text.contains(&format!("\t- {}/.json: Is open to public\n", base)));
    assert!(!text.contains("AIzaRestricted"));
}

#[tokio::test]
async fn test_observer_attached_through_scanner() {
    let addr = serve(|_| Reply::new(404, "")).await;
    let base = format!("http://{}", addr);
    let dir = apk(&format!(
        r#"<resources>
            <string name="firebase_database_url">{}</string>
            <string name="google_api_key">AIzaKey</string>
        </resources>"#,
        base
    ));
    let config = Config {
        urls: vec![format!("{}/a?key=", base), format!("{}/b?key=", base)],
        ..Config::default()
    };

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let scanner = Scanner::new(config, ScanOptions::default())
        .unwrap()
        .with_observer(move |result| sink.lock().unwrap().push(result.url.clone()));

    let report = scanner.scan(dir.path(), never_cancel()).await.unwrap();

    let mut urls = seen.lock().unwrap().clone();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            format!("{}/.json", base),
            format!("{}/a?key=AIzaKey", base),
            format!("{}/b?key=AIzaKey", base),
        ]
    );
    // A 404 from the database is still reported as open
    assert!(render(&report).contains(&format!("\t- {}/.json: Is open to public\n", base)));
}

#[tokio::test]
async fn test_cancel_before_start_reports_nothing() {
    let dir = apk("<resources/>");
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let report = Scanner::new(Config::default(), offline())
        .unwrap()
        .scan(dir.path(), rx)
        .await
        .unwrap();
    assert!(report.cancelled);
    assert!(report.sections.is_empty());
    assert!(render(&report).contains("Scan interrupted"));
}

// ============================================================================
// URL extraction
// ============================================================================

#[tokio::test]
async fn test_extract_urls_across_tree() {
    let dir = apk("<resources/>");
    write(
        dir.path(),
        "sources/com/example/Api.java",
        r#"class Api { String BASE = "https://api.example.com/v1"; }"#,
    );
    write(dir.path(), "resources/assets/config.json", r#"{"cdn": "http://cdn.example.com/assets."}"#);

    let options = ScanOptions {
        probe: false,
        extract_urls: true,
    };
    let report = scan(dir.path(), Config::default(), options).await.unwrap();
    let urls = report.urls.as_ref().unwrap();

    let found: Vec<&str> = urls.iter().map(|u| u.url.as_str()).collect();
    assert!(found.contains(&"https://api.example.com/v1"));
    assert!(found.contains(&"http://cdn.example.com/assets"));
    // The manifest's namespace URI is found as well
    assert!(found.contains(&"http://schemas.android.com/apk/res/android"));

    let text = render(&report);
    assert!(text.contains("URLs:\n"));
}
