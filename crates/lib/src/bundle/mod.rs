//! Boundary to the external asset bundler.
//!
//! The bundler is opaque: the pipeline hands it one source asset (plus any
//! extra entries) in a named group and gets back the directory it wrote.
//! A platform build only counts when that directory holds the catalog file.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::platform::{BuildProfile, PlatformTarget};
use crate::util::cmd::{CommandError, CommandSpec, run_command};

#[derive(Debug, Error)]
pub enum BundlerError {
  #[error("bundler command failed: {0}")]
  Command(#[from] CommandError),

  #[error("{file} was not produced in {dir}")]
  MissingCatalog { dir: PathBuf, file: String },

  #[error("failed to encode bundle entries: {0}")]
  Entries(#[from] serde_json::Error),
}

/// An additional addressable entry built alongside the main asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
  pub address: String,
  pub source: String,
}

/// What to bundle for one platform.
#[derive(Debug, Clone)]
pub struct BundleRequest {
  /// Group the main asset is placed in.
  pub group: String,
  /// Address of the main asset inside the group.
  pub address: String,
  pub source: String,
  pub entries: Vec<AssetEntry>,
  pub platform: PlatformTarget,
  pub profile: BuildProfile,
  /// Player version override; the bundler then names its catalog `catalog_<version>.json`.
  pub player_version: Option<String>,
  /// Directory the bundler writes its raw per-target output under.
  pub output_root: PathBuf,
}

pub trait Bundler: Send + Sync {
  /// Build the request for the currently active profile and return the raw output directory.
  fn bundle(&self, request: &BundleRequest) -> impl Future<Output = Result<PathBuf, BundlerError>> + Send;
}

/// Fail unless `dir` contains `catalog_file`.
pub fn verify_catalog(dir: &Path, catalog_file: &str) -> Result<(), BundlerError> {
  if dir.join(catalog_file).is_file() {
    Ok(())
  } else {
    Err(BundlerError::MissingCatalog {
      dir: dir.to_path_buf(),
      file: catalog_file.to_string(),
    })
  }
}

/// Catalog file a bundler writes for an overridden player version.
pub fn versioned_catalog_file(player_version: &str) -> String {
  format!("catalog_{player_version}.json")
}

/// Bundler that runs an external command.
///
/// Arguments may use `{source}`, `{platform}`, `{target}`, `{profile}`,
/// `{group}`, `{address}`, `{version}` and `{out}`. Extra entries are passed
/// as JSON in `VPACK_ENTRIES`, a player version override in
/// `VPACK_PLAYER_VERSION`. The command must write its output to `{out}/{target}`.
#[derive(Debug, Clone)]
pub struct CommandBundler {
  command: CommandSpec,
  cwd: PathBuf,
}

impl CommandBundler {
  pub fn new(command: CommandSpec, cwd: impl Into<PathBuf>) -> Self {
    Self {
      command,
      cwd: cwd.into(),
    }
  }
}

impl Bundler for CommandBundler {
  async fn bundle(&self, request: &BundleRequest) -> Result<PathBuf, BundlerError> {
    let vars = BTreeMap::from([
      ("source", request.source.clone()),
      ("platform", request.platform.dir_name().to_string()),
      ("target", request.platform.bundler_target().to_string()),
      ("profile", request.profile.to_string()),
      ("group", request.group.clone()),
      ("address", request.address.clone()),
      ("version", request.player_version.clone().unwrap_or_default()),
      ("out", request.output_root.display().to_string()),
    ]);
    let argv = self.command.render(&vars);
    let mut env = BTreeMap::from([("VPACK_ENTRIES".to_string(), serde_json::to_string(&request.entries)?)]);
    if let Some(version) = &request.player_version {
      env.insert("VPACK_PLAYER_VERSION".to_string(), version.clone());
    }

    run_command(&argv, Some(&self.cwd), &env).await?;

    let out = request.output_root.join(request.platform.bundler_target());
    debug!(platform = %request.platform, out = ?out, "bundler finished");
    Ok(out)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn request(out: &Path, platform: PlatformTarget) -> BundleRequest {
    BundleRequest {
      group: "VivenMap".into(),
      address: "vmap".into(),
      source: "/scenes/plaza.scene".into(),
      entries: vec![],
      platform,
      profile: BuildProfile::new("default"),
      player_version: None,
      output_root: out.to_path_buf(),
    }
  }

  #[test]
  fn catalog_must_exist() {
    let temp = TempDir::new().unwrap();
    assert!(matches!(
      verify_catalog(temp.path(), "catalog_v2.json"),
      Err(BundlerError::MissingCatalog { .. })
    ));

    std::fs::write(temp.path().join("catalog_v2.json"), "{}").unwrap();
    verify_catalog(temp.path(), "catalog_v2.json").unwrap();
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn command_bundler_returns_target_dir() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("bundles");
    let bundler = CommandBundler::new(
      CommandSpec::new([
        "sh",
        "-c",
        "mkdir -p \"$1/$2\" && echo \"$3\" > \"$1/$2/catalog_v2.json\"",
        "bundle",
        "{out}",
        "{target}",
        "{group}",
      ]),
      temp.path(),
    );

    let dir = bundler.bundle(&request(&out, PlatformTarget::Ios)).await.unwrap();

    assert_eq!(dir, out.join("iOS"));
    assert_eq!(std::fs::read_to_string(dir.join("catalog_v2.json")).unwrap().trim(), "VivenMap");
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn command_failure_is_a_bundler_error() {
    let temp = TempDir::new().unwrap();
    let bundler = CommandBundler::new(CommandSpec::new(["sh", "-c", "exit 2"]), temp.path());
    assert!(matches!(
      bundler.bundle(&request(temp.path(), PlatformTarget::Win)).await,
      Err(BundlerError::Command(_))
    ));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn player_version_reaches_the_command() {
    let temp = TempDir::new().unwrap();
    let bundler = CommandBundler::new(
      CommandSpec::new([
        "sh",
        "-c",
        "mkdir -p \"$1/$2\" && echo \"$VPACK_PLAYER_VERSION\" > \"$1/$2/catalog_$3.json\"",
        "bundle",
        "{out}",
        "{target}",
        "{version}",
      ]),
      temp.path(),
    );
    let mut request = request(temp.path(), PlatformTarget::Win);
    request.player_version = Some("0.1".into());

    let dir = bundler.bundle(&request).await.unwrap();

    let catalog = dir.join(versioned_catalog_file("0.1"));
    assert_eq!(std::fs::read_to_string(catalog).unwrap().trim(), "0.1");
  }
}
