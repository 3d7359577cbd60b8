//! ---
//! ss_section: "15-testing-qa"
//! ss_subsection: "integration-tests"
//! ss_type: "source"
//! ss_scope: "code"
//! ss_description: "End-to-end checks of the license CLI."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
use std::path::PathBuf;

use assert_cmd::Command;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../crates/sstack-licensing/tests/fixtures")
        .join(name)
}

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("sstack-licensectl").unwrap();
    cmd.env_remove("SSTACK_LOG").env_remove("RUST_LOG");
    cmd
}

fn run(cmd: &mut Command) -> (bool, String, String) {
    let output = cmd.output().unwrap();
    (
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
    )
}

#[test]
fn inspect_prints_record_and_signing_payload() {
    let (ok, stdout, _) = run(cli().arg("inspect").arg("--file").arg(fixture("business.lic")));
    assert!(ok);
    assert!(stdout.contains("Customer id: 1001"));
    assert!(stdout.contains("Features:    All"));
    assert!(stdout.contains("Signing payload: 1001:Acme Corp:2030-01-01:Business"));
}

#[test]
fn verify_accepts_key_signed_by_supplied_public_key() {
    let (ok, stdout, stderr) = run(cli()
        .arg("verify")
        .arg("--file")
        .arg(fixture("business.lic"))
        .arg("--public-key")
        .arg(fixture("test_license_key.xml"))
        .arg("--release-date")
        .arg("2024-06-01"));
    assert!(ok, "stderr: {stderr}");
    assert!(stdout.contains("License is valid"));
}

#[test]
fn verify_reports_expiry_and_mismatch() {
    let (ok, _, stderr) = run(cli()
        .arg("verify")
        .arg("--file")
        .arg(fixture("expired.lic"))
        .arg("--public-key")
        .arg(fixture("test_license_key.xml"))
        .arg("--release-date")
        .arg("2024-06-01"));
    assert!(!ok);
    assert!(stderr.contains("expired on 2015-01-01"));

    let (ok, _, stderr) = run(cli().arg("verify").arg("--file").arg(fixture("mismatched.lic")));
    assert!(!ok);
    assert!(stderr.contains("is not assigned to CustomerId 'ACME'"));
}

#[test]
fn quota_follows_free_tier_and_license() {
    let (ok, stdout, _) = run(cli().args(["quota", "Text", "Types", "20"]));
    assert!(ok);
    assert!(stdout.contains("Free-tier limit: 20"));

    let (ok, _, stderr) = run(cli().args(["quota", "Text", "Types", "21"]));
    assert!(!ok);
    assert!(stderr.contains("'20 Text Types'"));

    let (ok, stdout, stderr) = run(cli()
        .args(["quota", "Text", "Types", "5000", "--file"])
        .arg(fixture("text.lic"))
        .arg("--public-key")
        .arg(fixture("test_license_key.xml"))
        .arg("--release-date")
        .arg("2024-06-01"));
    assert!(ok, "stderr: {stderr}");
    assert!(stdout.contains("Licensed features: Text"));
}

#[test]
fn inspect_json_lists_features() {
    let (ok, stdout, _) = run(cli()
        .args(["inspect", "--json", "--file"])
        .arg(fixture("text.lic")));
    assert!(ok);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["customer_id"], "1002");
    assert_eq!(report["features"], serde_json::json!(["Text"]));
}
