//! Shared test helpers for CLI integration tests.

use std::io::Read;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Bundler stand-in: `bundle.sh <target> <out>` writes `<out>/<target>`.
///
/// Targets listed in `FAIL_TARGETS` exit non-zero. The catalog is named
/// after `VPACK_PLAYER_VERSION` when it is set.
const BUNDLER_SCRIPT: &str = r#"#!/bin/sh
set -e
target="$1"
out="$2"
for failing in $FAIL_TARGETS; do
  if [ "$failing" = "$target" ]; then
    echo "bundling $target exploded" >&2
    exit 3
  fi
done
mkdir -p "$out/$target"
echo "bundle for $target" > "$out/$target/content.bundle"
echo '{}' > "$out/$target/catalog_${VPACK_PLAYER_VERSION:-v2}.json"
echo "$target" >> "$VPACK_TEST_LOG"
"#;

const SCENE: &str = r#"{
  "roots": [{
    "name": "Environment",
    "components": [{ "type": "environmentMarker", "properties": [{ "key": "theme", "value": "night" }] }],
    "children": [{
      "name": "Door",
      "components": [{ "type": "networkObject", "objectId": "3de31e8d-17af-4834-af7d-ebe37009b82b" }]
    }]
  }]
}"#;

/// Isolated project with its own work and output directories.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// A world project named "Plaza" enabled for `platforms`.
  pub fn world(platforms: &[&str]) -> Self {
    let env = Self { temp: TempDir::new().unwrap() };
    env.write_file("bundle.sh", BUNDLER_SCRIPT);
    env.write_file("scenes/plaza.scene", SCENE);

    let targets: serde_json::Map<String, serde_json::Value> = platforms
      .iter()
      .map(|p| {
        (
          p.to_string(),
          serde_json::json!({ "enabled": true, "sourcePath": "scenes/plaza.scene" }),
        )
      })
      .collect();
    let project = serde_json::json!({
      "content": {
        "kind": "world",
        "displayName": "Plaza",
        "contentVersion": "1.2.0",
        "properties": [{ "key": "capacity", "value": "16" }],
        "targets": targets,
      },
      "profiles": { "win": "Windows", "mac": "macOS", "aos": "Android", "ios": "iOS", "web": "WebGL" },
      "bundler": ["sh", "bundle.sh", "{target}", "{out}"],
      "destination": "dist",
      "workDir": "work",
    });
    env.write_file("vpack.json", &serde_json::to_string_pretty(&project).unwrap());
    env
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn root(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap()
  }

  pub fn package_path(&self) -> PathBuf {
    self.root().join("dist").join("Plaza.vmap")
  }

  pub fn staging_path(&self) -> PathBuf {
    self.root().join("work/staging/vmap-Plaza")
  }

  pub fn local_test_path(&self) -> PathBuf {
    self.root().join("live")
  }

  pub fn manual_path(&self) -> PathBuf {
    self.root().join("work/manual/Plaza")
  }

  /// Bundler targets invoked so far, in order.
  pub fn bundled(&self) -> Vec<String> {
    std::fs::read_to_string(self.temp.path().join("bundled.log"))
      .unwrap_or_default()
      .lines()
      .map(str::to_string)
      .collect()
  }

  /// Profile left in the project's state file.
  pub fn active_profile(&self) -> serde_json::Value {
    let state = std::fs::read_to_string(self.temp.path().join(".vpack/active-profile.json")).unwrap();
    serde_json::from_str::<serde_json::Value>(&state).unwrap()["profile"].clone()
  }

  /// A vpack command run from the project directory.
  pub fn vpack_cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("vpack");
    cmd
      .current_dir(self.temp.path())
      .env("VPACK_TEST_LOG", self.temp.path().join("bundled.log"))
      .env("VPACK_USER_ID", "u-42")
      .env("VPACK_NICKNAME", "Tester")
      .env_remove("RUST_LOG")
      .env_remove("FAIL_TARGETS");
    cmd
  }
}

/// Sorted entry names of a zip archive.
pub fn archive_entries(path: &Path) -> Vec<String> {
  let file = std::fs::File::open(path).unwrap();
  let archive = zip::ZipArchive::new(file).unwrap();
  let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
  names.sort();
  names
}

pub fn archive_text(path: &Path, name: &str) -> String {
  let file = std::fs::File::open(path).unwrap();
  let mut archive = zip::ZipArchive::new(file).unwrap();
  let mut content = String::new();
  archive.by_name(name).unwrap().read_to_string(&mut content).unwrap();
  content
}
