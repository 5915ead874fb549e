//! `test-local` integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn test_local_builds_win_and_writes_trigger() {
  let env = TestEnv::world(&["win", "aos"]);
  env.write_file("live/old/leftover.bundle", "old");

  env
    .vpack_cmd()
    .args(["test-local", "--dir"])
    .arg(env.local_test_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("local test build ready"));

  let live = env.local_test_path();
  assert!(live.join("StandaloneWindows64/catalog_0.1.json").is_file());
  assert!(!live.join("old").exists());
  let trigger = std::fs::read_to_string(live.join("reload_trigger.txt")).unwrap();
  assert!(!trigger.trim().is_empty());

  assert_eq!(env.bundled(), vec!["StandaloneWindows64"]);
  assert_eq!(env.active_profile(), serde_json::Value::Null);
  assert!(!env.package_path().exists());
}

#[test]
fn failed_test_local_restores_profile() {
  let env = TestEnv::world(&["win"]);

  env
    .vpack_cmd()
    .args(["test-local", "--dir"])
    .arg(env.local_test_path())
    .env("FAIL_TARGETS", "StandaloneWindows64")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("bundling StandaloneWindows64 exploded"));

  assert_eq!(env.active_profile(), serde_json::Value::Null);
  assert!(!env.local_test_path().join("reload_trigger.txt").exists());
}
