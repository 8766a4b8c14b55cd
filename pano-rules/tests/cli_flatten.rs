use std::path::PathBuf;
use std::{fs, path::Path};

use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::tempdir;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn path_as_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

fn read_documents(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .expect("read output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect()
}

fn strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v.as_str().expect("string").to_string())
        .collect()
}

fn flatten_fixture(output: &Path) -> Vec<Value> {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pano-rules"));
    cmd.arg("flatten")
        .arg(fixture("fixtures/panorama-basic.xml"))
        .arg("--tenant")
        .arg("acme")
        .arg("--date")
        .arg("2024-06-30")
        .arg("--output")
        .arg(path_as_str(output))
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "flatten_summary rules=5 skipped=1 catalog_issues=1 unknown=2 dynamic=1 cycles=1",
        ));
    read_documents(output)
}

#[test]
fn flatten_writes_one_document_per_named_rule() {
    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("out.ndjson");
    let documents = flatten_fixture(&output);

    let uids: Vec<&str> = documents
        .iter()
        .map(|d| d["rule_uid"].as_str().expect("uid"))
        .collect();
    assert_eq!(
        uids,
        vec![
            "Grandchild1:pre-rules:1:allow-web",
            "Grandchild1:pre-rules:2:dyn-rule",
            "Grandchild1:rules:1:allow-web",
            "Grandchild1:post-rules:1:cleanup_deny_",
            "Orphan:pre-rules:2:orphan-rule",
        ]
    );
    assert!(!dir.path().join("out.ndjson.partial").exists());
    for document in &documents {
        assert_eq!(document["panorama_tenant"], "acme");
        assert_eq!(document["snapshot_date"], "2024-06-30");
    }
}

#[test]
fn flatten_resolves_through_inheritance() {
    let dir = tempdir().expect("tempdir");
    let documents = flatten_fixture(&dir.path().join("out.ndjson"));

    let web = &documents[0];
    assert_eq!(
        strings(&web["device_group_path"]),
        vec!["Root", "Child1", "Grandchild1"]
    );
    assert_eq!(strings(&web["expanded"]["src_addresses"]), vec!["10.2.0.1"]);
    assert_eq!(
        strings(&web["expanded"]["dst_addresses"]),
        vec!["10.0.0.10", "10.0.0.0/8"]
    );
    assert_eq!(
        strings(&web["expanded"]["applications"]),
        vec!["web-browsing", "ssl"]
    );
    assert_eq!(
        strings(&web["expanded"]["services"]),
        vec!["application-default"]
    );
    assert_eq!(strings(&web["expanded"]["ports"]), vec!["application-default"]);
    assert_eq!(web["orig"]["profiles"]["group"], "strict");
    assert_eq!(web["orig"]["comments"], "outbound web");
    assert_eq!(web["meta"]["unresolved_notes"], "");

    let dynamic = &documents[1];
    assert_eq!(
        strings(&dynamic["expanded"]["src_addresses"]),
        vec!["DAG:dag-tagged"]
    );
    assert_eq!(
        strings(&dynamic["expanded"]["dst_addresses"]),
        vec!["172.16.0.0/16"]
    );
    assert_eq!(strings(&dynamic["expanded"]["ports"]), vec!["80", "443"]);
    assert_eq!(dynamic["meta"]["has_dynamic_groups"], true);
    assert_eq!(
        strings(&dynamic["meta"]["dynamic_groups_unresolved"]),
        vec!["dag-tagged"]
    );
    assert_eq!(dynamic["action"], "allow");
}

#[test]
fn flatten_marks_unknown_and_cyclic_references() {
    let dir = tempdir().expect("tempdir");
    let documents = flatten_fixture(&dir.path().join("out.ndjson"));

    let local = &documents[2];
    assert_eq!(local["action"], "deny");
    assert_eq!(local["disabled"], true);
    assert_eq!(strings(&local["expanded"]["to_zones"]), vec!["UNKNOWN:guest"]);
    assert_eq!(
        strings(&local["expanded"]["src_addresses"]),
        vec!["UNKNOWN:nonexistent"]
    );
    assert_eq!(
        strings(&local["expanded"]["dst_addresses"]),
        vec!["CYCLE:loop-a"]
    );
    assert_eq!(
        strings(&local["expanded"]["services"]),
        vec!["tcp/80", "tcp/443"]
    );
    assert_eq!(
        local["meta"]["unresolved_notes"],
        "UNKNOWN:guest; UNKNOWN:nonexistent; CYCLE:loop-a"
    );
    assert!(strings(&local["targets"]["include"]).is_empty());
    assert_eq!(strings(&local["targets"]["exclude"]), vec!["0123456789"]);
    assert!(local["orig"]["profiles"]["group"].is_null());
    assert_eq!(
        strings(&local["orig"]["profiles"]["names"]),
        vec!["default", "strict"]
    );
}

#[test]
fn flatten_falls_back_to_shared_for_orphaned_groups() {
    let dir = tempdir().expect("tempdir");
    let documents = flatten_fixture(&dir.path().join("out.ndjson"));

    let orphan = &documents[4];
    assert_eq!(strings(&orphan["device_group_path"]), vec!["Orphan"]);
    assert_eq!(
        strings(&orphan["expanded"]["src_addresses"]),
        vec!["192.168.1.1"]
    );
    assert_eq!(
        strings(&orphan["expanded"]["dst_addresses"]),
        vec!["10.5.0.1-10.5.0.20"]
    );
    assert_eq!(strings(&orphan["expanded"]["services"]), vec!["udp/53"]);
    assert_eq!(orphan["position"], 2);
    assert_eq!(orphan["disabled"], false);
}

#[test]
fn flatten_uses_default_output_path_from_settings() {
    let dir = tempdir().expect("tempdir");
    let settings = dir.path().join("settings.toml");
    let out_dir = dir.path().join("exports");
    fs::write(
        &settings,
        format!("output_dir = \"{}\"\n", path_as_str(&out_dir).replace('\\', "/")),
    )
    .expect("write settings");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pano-rules"));
    cmd.arg("flatten")
        .arg(fixture("fixtures/panorama-basic.xml"))
        .arg("--tenant")
        .arg("acme")
        .arg("--date")
        .arg("2024-06-30")
        .arg("--settings")
        .arg(path_as_str(&settings))
        .assert()
        .success();

    let documents = read_documents(&out_dir.join("acme_2024-06-30.ndjson"));
    assert_eq!(documents.len(), 5);
}

#[test]
fn flatten_fails_for_missing_input() {
    let dir = tempdir().expect("tempdir");
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pano-rules"));
    cmd.arg("flatten")
        .arg(path_as_str(&dir.path().join("absent.xml")))
        .arg("--tenant")
        .arg("acme")
        .arg("--output")
        .arg(path_as_str(&dir.path().join("out.ndjson")))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse"));
    assert!(!dir.path().join("out.ndjson").exists());
}

#[test]
fn flatten_rejects_invalid_date() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pano-rules"));
    cmd.arg("flatten")
        .arg(fixture("fixtures/panorama-basic.xml"))
        .arg("--tenant")
        .arg("acme")
        .arg("--date")
        .arg("2024-02-30")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid date"));
}

#[test]
fn flatten_reports_xml_syntax_errors() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("broken.xml");
    fs::write(&input, "<config>\n  <shared>\n</config>\n").expect("write");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pano-rules"));
    cmd.arg("flatten")
        .arg(path_as_str(&input))
        .arg("--tenant")
        .arg("acme")
        .arg("--output")
        .arg(path_as_str(&dir.path().join("out.ndjson")))
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 3"));
}

#[test]
fn flatten_refuses_to_overwrite_input() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("config.xml");
    fs::copy(fixture("fixtures/panorama-basic.xml"), &input).expect("copy fixture");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pano-rules"));
    cmd.arg("flatten")
        .arg(path_as_str(&input))
        .arg("--tenant")
        .arg("acme")
        .arg("--output")
        .arg(path_as_str(&input))
        .assert()
        .failure()
        .stderr(predicate::str::contains("refusing to overwrite"));
    let original = fs::read_to_string(&input).expect("read");
    assert!(original.contains("<config"));
}
