use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::bundle::BundlerError;
use crate::consts::DEFAULT_CATALOG_FILE;
use crate::content::{ContentDescriptor, ContentKind};
use crate::env::EnvironmentError;
use crate::manifest::ManifestError;
use crate::platform::{Host, paths};
use crate::scene::AssetError;
use crate::staging::{RelocationError, StagingPolicy};
use crate::util::fs::sanitize_component;
use crate::validate::ValidationError;

/// Outcome of a build invocation.
///
/// Failures never escape a run as errors; they end up here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
  pub target_name: String,
  pub success: bool,
  pub message: String,
  pub duration_seconds: f64,
  pub output_path: String,
}

impl BuildResult {
  pub fn success(
    target_name: impl Into<String>,
    message: impl Into<String>,
    duration: Duration,
    output_path: impl Into<String>,
  ) -> Self {
    Self {
      target_name: target_name.into(),
      success: true,
      message: message.into(),
      duration_seconds: duration.as_secs_f64(),
      output_path: output_path.into(),
    }
  }

  pub fn fail(
    target_name: impl Into<String>,
    message: impl Into<String>,
    duration: Duration,
    output_path: impl Into<String>,
  ) -> Self {
    Self {
      success: false,
      ..Self::success(target_name, message, duration, output_path)
    }
  }
}

impl From<&BuildResult> for bool {
  fn from(result: &BuildResult) -> Self {
    result.success
  }
}

impl fmt::Display for BuildResult {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let status = if self.success { "succeeded" } else { "failed" };
    write!(
      f,
      "{} {} in {:.2}s: {}",
      self.target_name, status, self.duration_seconds, self.message
    )
  }
}

/// Failure classes a build run can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
  Validation,
  Environment,
  Bundling,
  Relocation,
  Archive,
  /// A step panicked.
  Internal,
}

#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("failed to save corrected asset: {0}")]
  Asset(#[from] AssetError),

  #[error(transparent)]
  Environment(#[from] EnvironmentError),

  #[error(transparent)]
  Bundler(#[from] BundlerError),

  #[error(transparent)]
  Relocation(#[from] RelocationError),

  #[error(transparent)]
  Manifest(#[from] ManifestError),

  #[error(transparent)]
  Archive(#[from] ArchiveError),

  #[error("local test builds only support worlds, not {kind}")]
  LocalTestUnsupported { kind: ContentKind },

  #[error("failed to write reload trigger {path}: {source}")]
  ReloadTrigger {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("nothing to package in {path}")]
  NothingToPackage { path: PathBuf },

  #[error("build panicked: {0}")]
  Panicked(String),
}

impl BuildError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation(_) | Self::Asset(_) | Self::LocalTestUnsupported { .. } => ErrorKind::Validation,
      Self::Manifest(ManifestError::DuplicateKey { .. }) => ErrorKind::Validation,
      Self::Manifest(_) | Self::Archive(_) | Self::NothingToPackage { .. } | Self::ReloadTrigger { .. } => {
        ErrorKind::Archive
      }
      Self::Environment(_) => ErrorKind::Environment,
      Self::Bundler(_) => ErrorKind::Bundling,
      Self::Relocation(_) => ErrorKind::Relocation,
      Self::Panicked(_) => ErrorKind::Internal,
    }
  }
}

/// Where a pipeline keeps its working directories and how it treats failures.
#[derive(Debug, Clone)]
pub struct BuildOptions {
  pub work_dir: PathBuf,
  /// File whose presence marks a successful platform bundle.
  pub catalog_file: String,
  pub staging_policy: StagingPolicy,
  pub host: Host,
  /// Where local test builds are written; cleared on every local test run.
  pub local_test_dir: PathBuf,
}

impl BuildOptions {
  pub fn new(work_dir: impl Into<PathBuf>) -> Self {
    Self {
      work_dir: work_dir.into(),
      catalog_file: DEFAULT_CATALOG_FILE.to_string(),
      staging_policy: StagingPolicy::default(),
      host: Host::current(),
      local_test_dir: paths::local_test_dir(),
    }
  }

  pub fn with_staging_policy(mut self, policy: StagingPolicy) -> Self {
    self.staging_policy = policy;
    self
  }

  pub fn with_catalog_file(mut self, catalog_file: impl Into<String>) -> Self {
    self.catalog_file = catalog_file.into();
    self
  }

  pub fn with_host(mut self, host: Host) -> Self {
    self.host = host;
    self
  }

  pub fn with_local_test_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.local_test_dir = dir.into();
    self
  }

  /// `<work>/staging/<ext>-<name>`
  pub fn staging_root(&self, descriptor: &ContentDescriptor) -> PathBuf {
    self.work_dir.join("staging").join(format!(
      "{}-{}",
      descriptor.kind.extension(),
      sanitize_component(&descriptor.display_name)
    ))
  }

  /// `<work>/bundles/<name>`: where the bundler writes raw output.
  pub fn bundle_root(&self, descriptor: &ContentDescriptor) -> PathBuf {
    self.work_dir.join("bundles").join(sanitize_component(&descriptor.display_name))
  }

  /// `<work>/manual/<name>`: persistent folder of manual platform builds.
  pub fn manual_root(&self, descriptor: &ContentDescriptor) -> PathBuf {
    self.work_dir.join("manual").join(sanitize_component(&descriptor.display_name))
  }

  pub fn work_dir(&self) -> &Path {
    &self.work_dir
  }
}
