//! Manual `build-platform` and `package` integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, archive_entries};

#[test]
fn build_platform_then_package() {
  let env = TestEnv::world(&["win", "aos"]);

  env
    .vpack_cmd()
    .args(["build-platform", "WIN"])
    .assert()
    .success()
    .stdout(predicate::str::contains("built WIN into manual folder"));
  env.vpack_cmd().args(["build-platform", "Android"]).assert().success();

  assert!(env.manual_path().join("win/catalog_v2.json").exists());
  assert!(env.manual_path().join("aos/catalog_v2.json").exists());
  env.write_file("work/manual/Plaza/notes.txt", "scratch");

  env
    .vpack_cmd()
    .arg("package")
    .assert()
    .success()
    .stdout(predicate::str::contains("packaged 2 platform(s)"));

  let entries = archive_entries(&env.package_path());
  assert!(entries.contains(&"win/catalog_v2.json".to_string()));
  assert!(entries.contains(&"aos/catalog_v2.json".to_string()));
  assert!(entries.contains(&"metadata.json".to_string()));
  assert!(!entries.contains(&"notes.txt".to_string()));
  assert!(!env.manual_path().exists());
}

#[test]
fn rebuilding_a_platform_replaces_it() {
  let env = TestEnv::world(&["win"]);

  env.vpack_cmd().args(["build-platform", "win"]).assert().success();
  env.write_file("work/manual/Plaza/win/stale.bundle", "old");
  env.vpack_cmd().args(["build-platform", "win"]).assert().success();

  assert!(!env.manual_path().join("win/stale.bundle").exists());
  assert!(env.manual_path().join("win/catalog_v2.json").exists());
}

#[test]
fn package_without_manual_builds_fails() {
  let env = TestEnv::world(&["win"]);

  env
    .vpack_cmd()
    .arg("package")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("nothing to package"));
}

#[test]
fn failed_manual_build_restores_profile() {
  let env = TestEnv::world(&["aos"]);

  env
    .vpack_cmd()
    .args(["build-platform", "aos"])
    .env("FAIL_TARGETS", "Android")
    .assert()
    .code(1);

  assert_eq!(env.active_profile(), serde_json::Value::Null);
  assert!(!env.manual_path().join("aos").exists());
}
