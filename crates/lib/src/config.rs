//! Project file (`vpack.json`) loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::build::BuildOptions;
use crate::consts::DEFAULT_CATALOG_FILE;
use crate::content::ContentDescriptor;
use crate::platform::{ProfileMap, paths};
use crate::staging::StagingPolicy;
use crate::util::cmd::CommandSpec;

pub const PROJECT_FILE: &str = "vpack.json";

/// Directory under the project root holding per-project state.
pub const STATE_DIR: &str = ".vpack";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read project file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid project file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("project file {path} has an empty bundler command")]
  EmptyBundler { path: PathBuf },
}

fn default_catalog_file() -> String {
  DEFAULT_CATALOG_FILE.to_string()
}

/// Contents of a project file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
  pub content: ContentDescriptor,
  #[serde(default)]
  pub profiles: ProfileMap,
  /// External bundler invocation; see [`crate::bundle::CommandBundler`].
  pub bundler: CommandSpec,
  /// Run after every profile switch; the environment is settled once it exits.
  #[serde(default)]
  pub refresh: Option<CommandSpec>,
  #[serde(default = "default_catalog_file")]
  pub catalog_file: String,
  #[serde(default)]
  pub staging_policy: StagingPolicy,
  #[serde(default)]
  pub destination: Option<PathBuf>,
  /// Packages that must be present before any platform is switched.
  #[serde(default)]
  pub prerequisites: Vec<String>,
  #[serde(default)]
  pub work_dir: Option<PathBuf>,
  /// Overrides the directory local test builds are written to.
  #[serde(default)]
  pub local_test_dir: Option<PathBuf>,
}

/// A loaded project file and the directory it lives in.
#[derive(Debug, Clone)]
pub struct Project {
  pub root: PathBuf,
  pub config: ProjectConfig,
}

impl Project {
  /// Load `path`; relative paths inside it resolve against its directory.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let mut config: ProjectConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    if config.bundler.is_empty() {
      return Err(ConfigError::EmptyBundler { path: path.to_path_buf() });
    }

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let root = dunce::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf());
    config.destination = config.destination.map(|d| root.join(d));
    config.work_dir = config.work_dir.map(|d| root.join(d));
    config.local_test_dir = config.local_test_dir.map(|d| root.join(d));

    debug!(path = ?path, root = ?root, name = %config.content.display_name, "loaded project");
    Ok(Self { root, config })
  }

  /// Configured work directory, else the per-user default.
  pub fn work_dir(&self) -> PathBuf {
    self.config.work_dir.clone().unwrap_or_else(paths::work_dir)
  }

  pub fn build_options(&self) -> BuildOptions {
    let options = BuildOptions::new(self.work_dir())
      .with_catalog_file(self.config.catalog_file.clone())
      .with_staging_policy(self.config.staging_policy);
    match &self.config.local_test_dir {
      Some(dir) => options.with_local_test_dir(dir),
      None => options,
    }
  }

  /// State file of the project's active build profile.
  pub fn profile_state_file(&self) -> PathBuf {
    self.root.join(STATE_DIR).join("active-profile.json")
  }
}
