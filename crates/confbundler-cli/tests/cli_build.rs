#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Read;
use std::path::Path;
use tempfile::tempdir;

fn confbundler() -> Command {
    let mut cmd = Command::cargo_bin("confbundler").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_bundle(dir: &Path, manifest: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("manifest.yaml"), manifest).unwrap();
}

fn entry_names(archive: &Path) -> Vec<String> {
    let mut reader = tar::Archive::new(fs::File::open(archive).unwrap());
    reader
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn build_merges_bundles_in_order() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("base");
    let site = dir.path().join("site");
    write_bundle(
        &base,
        "files:\n  - /etc/motd\n  - /etc/passwd\n  - /srv: {state: directory}\n",
    );
    fs::create_dir_all(base.join("etc")).unwrap();
    fs::write(base.join("etc/motd"), "welcome\n").unwrap();
    fs::write(base.join("etc/passwd"), "root:x:0:0\n").unwrap();
    write_bundle(&site, "files:\n  - /etc/passwd: {state: absent}\n");

    let output = dir.path().join("out.tar");
    confbundler()
        .arg("build")
        .arg(&base)
        .arg(&site)
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("etc/passwd not materialized"));

    assert_eq!(entry_names(&output), vec!["etc/motd", "srv"]);

    let mut reader = tar::Archive::new(fs::File::open(&output).unwrap());
    let mut motd = reader.entries().unwrap().next().unwrap().unwrap();
    let mut content = String::new();
    motd.read_to_string(&mut content).unwrap();
    assert_eq!(content, "welcome\n");
}

#[test]
fn existing_output_requires_force() {
    let dir = tempdir().unwrap();
    let bundle = dir.path().join("bundle");
    write_bundle(&bundle, "files:\n  - /srv: {state: directory}\n");
    let output = dir.path().join("out.tar");
    fs::write(&output, "keep me").unwrap();

    confbundler()
        .arg("build")
        .arg(&bundle)
        .arg(&output)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(fs::read_to_string(&output).unwrap(), "keep me");

    confbundler()
        .args(["build", "--force"])
        .arg(&bundle)
        .arg(&output)
        .assert()
        .success();
    assert_eq!(entry_names(&output), vec!["srv"]);
}

#[test]
fn failed_build_leaves_no_output() {
    let dir = tempdir().unwrap();
    let bundle = dir.path().join("bundle");
    write_bundle(&bundle, "files:\n  - /etc/missing\n");
    let output = dir.path().join("out.tar");

    confbundler()
        .arg("build")
        .arg(&bundle)
        .arg(&output)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing"));
    assert!(!output.exists());
    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .filter(|name| name.to_string_lossy().starts_with(".confbundler-"))
        .collect();
    assert!(leftovers.is_empty(), "staging files left: {:?}", leftovers);
}

#[test]
fn deny_warnings_fails_with_code_3() {
    let dir = tempdir().unwrap();
    let bundle = dir.path().join("bundle");
    write_bundle(&bundle, "files:\n  - /srv: {state: directory, colour: blue}\n");
    let output = dir.path().join("out.tar");

    confbundler()
        .args(["build", "--deny-warnings"])
        .arg(&bundle)
        .arg(&output)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("W_UNRECOGNIZED_PROPERTY"));
    assert!(!output.exists());
}

#[test]
fn deny_warnings_accepts_absent_entries() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("base");
    let site = dir.path().join("site");
    write_bundle(
        &base,
        "files:\n  - /srv: {state: directory}\n  - /tmp/old: {state: directory}\n",
    );
    write_bundle(&site, "files:\n  - /tmp/old: {state: absent}\n");
    let output = dir.path().join("out.tar");

    confbundler()
        .args(["build", "--deny-warnings"])
        .arg(&base)
        .arg(&site)
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("0 warning(s)"));
    assert_eq!(entry_names(&output), vec!["srv"]);
}

#[test]
fn tgz_output_is_compressed() {
    let dir = tempdir().unwrap();
    let bundle = dir.path().join("bundle");
    write_bundle(
        &bundle,
        "files:\n  - /etc/issue: {state: file, content: hello}\n",
    );
    let output = dir.path().join("out.tgz");

    confbundler()
        .arg("build")
        .arg(&bundle)
        .arg(&output)
        .assert()
        .success();

    let decoder = flate2::read::GzDecoder::new(fs::File::open(&output).unwrap());
    let mut reader = tar::Archive::new(decoder);
    let entry = reader.entries().unwrap().next().unwrap().unwrap();
    assert_eq!(entry.path().unwrap().to_string_lossy(), "etc/issue");
    assert_eq!(entry.header().size().unwrap(), 5);
}

#[test]
fn manifest_file_can_be_passed_directly() {
    let dir = tempdir().unwrap();
    let manifest = dir.path().join("web.yaml");
    fs::write(&manifest, "files:\n  - /var/www: {state: directory, mode: '0750'}\n").unwrap();
    let output = dir.path().join("out.tar");

    confbundler()
        .arg("build")
        .arg(&manifest)
        .arg(&output)
        .assert()
        .success();

    let mut reader = tar::Archive::new(fs::File::open(&output).unwrap());
    let entry = reader.entries().unwrap().next().unwrap().unwrap();
    assert_eq!(entry.header().mode().unwrap(), 0o750);
}

#[test]
fn plan_prints_json() {
    let dir = tempdir().unwrap();
    let bundle = dir.path().join("bundle");
    write_bundle(
        &bundle,
        "files:\n  - /etc/motd\npackages:\n  - nginx\nusers:\n  - deploy: {id: 1001}\n",
    );

    let assert = confbundler()
        .args(["plan", "--json"])
        .arg(&bundle)
        .assert()
        .success();
    let json: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(json["files"][0]["state"], "from-host");
    assert_eq!(json["packages"][0]["name"], "nginx");
    assert_eq!(json["users"][0]["id"], 1001);
}

#[test]
fn plan_reports_load_errors() {
    let dir = tempdir().unwrap();
    confbundler()
        .arg("plan")
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("manifest.yaml"));
}
