//! Build command integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, archive_entries, archive_text};

#[test]
fn build_writes_package() {
  let env = TestEnv::world(&["win", "aos"]);

  env
    .vpack_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("built 2 platform(s)"));

  let package = env.package_path();
  let entries = archive_entries(&package);
  for expected in [
    "aos/",
    "aos/catalog_v2.json",
    "aos/content.bundle",
    "manifest.hash",
    "manifest.json",
    "metadata.hash",
    "metadata.json",
    "win/",
    "win/catalog_v2.json",
    "win/content.bundle",
  ] {
    assert!(entries.contains(&expected.to_string()), "missing {expected} in {entries:?}");
  }
  assert_eq!(env.bundled(), vec!["StandaloneWindows64", "Android"]);
  assert!(!env.staging_path().exists());
}

#[test]
fn build_stamps_manifest_and_metadata() {
  let env = TestEnv::world(&["web"]);
  env.vpack_cmd().arg("build").assert().success();

  let manifest = archive_text(&env.package_path(), "manifest.json");
  assert_eq!(
    manifest,
    r#"{"cttDataType":"Addressable","cttProps":{"theme":"night","capacity":"16"}}"#
  );

  let metadata: serde_json::Value = serde_json::from_str(&archive_text(&env.package_path(), "metadata.json")).unwrap();
  assert_eq!(metadata["creatorId"], "u-42");
  assert_eq!(metadata["creatorNickname"], "Tester");
  assert_eq!(metadata["buildType"], "vmap");
  assert_eq!(metadata["mapName"], "Plaza");
  assert_eq!(metadata["availablePlatforms"], serde_json::json!(["WEB"]));
  assert_eq!(metadata["contentVersion"], "1.2.0");
}

#[test]
fn build_restores_profile() {
  let env = TestEnv::world(&["win", "ios"]);
  env.vpack_cmd().arg("build").assert().success();

  assert_eq!(env.active_profile(), serde_json::Value::Null);
}

#[test]
fn failing_platform_stops_build_and_keeps_staging() {
  let env = TestEnv::world(&["win", "mac", "aos", "web"]);

  env
    .vpack_cmd()
    .arg("build")
    .env("FAIL_TARGETS", "Android")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("bundling Android exploded"))
    .stdout(predicate::str::contains("Staging kept at"));

  assert_eq!(env.bundled(), vec!["StandaloneWindows64", "StandaloneOSX"]);
  assert!(!env.package_path().exists());
  assert!(env.staging_path().join("win/catalog_v2.json").exists());
  assert!(env.staging_path().join("mac/catalog_v2.json").exists());
  assert_eq!(env.active_profile(), serde_json::Value::Null);
}

#[test]
fn purge_on_failure_removes_staging() {
  let env = TestEnv::world(&["win", "aos"]);

  env
    .vpack_cmd()
    .args(["build", "--purge-on-failure"])
    .env("FAIL_TARGETS", "Android")
    .assert()
    .code(1);

  assert!(!env.staging_path().exists());
}

#[test]
fn json_result() {
  let env = TestEnv::world(&["win"]);

  let output = env.vpack_cmd().args(["-o", "json", "build"]).output().unwrap();

  assert!(output.status.success());
  let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(result["targetName"], "Plaza");
  assert_eq!(result["success"], true);
  assert_eq!(result["outputPath"], env.package_path().display().to_string());
}

#[test]
fn out_flag_overrides_destination() {
  let env = TestEnv::world(&["win"]);
  let out = env.root().join("elsewhere");

  env.vpack_cmd().args(["build", "--out"]).arg(&out).assert().success();

  assert!(out.join("Plaza.vmap").exists());
  assert!(!env.package_path().exists());
}

#[test]
fn verify_checks_built_package() {
  let env = TestEnv::world(&["win", "web"]);
  env.vpack_cmd().arg("build").assert().success();

  env
    .vpack_cmd()
    .arg("verify")
    .arg(env.package_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("WIN, WEB"))
    .stdout(predicate::str::contains("manifest.json → hash ok"));
}
