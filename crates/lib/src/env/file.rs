use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{BuildEnvironment, EnvironmentError};
use crate::platform::BuildProfile;
use crate::util::cmd::{CommandSpec, run_command};
use crate::util::fs::write_atomic;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ActiveProfileState {
  profile: Option<BuildProfile>,
}

#[derive(Debug, Default, Deserialize)]
struct PackagesManifest {
  #[serde(default)]
  dependencies: HashMap<String, serde_json::Value>,
}

/// Build environment persisted to a JSON state file.
///
/// Activation writes the state file and then runs the refresh command, if
/// any, to completion; the environment counts as settled once it exits.
#[derive(Debug, Clone)]
pub struct FileEnvironment {
  state_file: PathBuf,
  project_root: PathBuf,
  refresh: Option<CommandSpec>,
  packages_manifest: PathBuf,
  prerequisites: Vec<String>,
}

impl FileEnvironment {
  pub fn new(project_root: impl Into<PathBuf>, state_file: impl Into<PathBuf>) -> Self {
    let project_root = project_root.into();
    Self {
      state_file: state_file.into(),
      packages_manifest: project_root.join(crate::consts::DEFAULT_PACKAGES_MANIFEST),
      project_root,
      refresh: None,
      prerequisites: Vec::new(),
    }
  }

  pub fn with_refresh(mut self, refresh: CommandSpec) -> Self {
    self.refresh = (!refresh.is_empty()).then_some(refresh);
    self
  }

  pub fn with_packages_manifest(mut self, path: impl Into<PathBuf>) -> Self {
    self.packages_manifest = path.into();
    self
  }

  pub fn with_prerequisites(mut self, packages: Vec<String>) -> Self {
    self.prerequisites = packages;
    self
  }

  pub fn state_file(&self) -> &Path {
    &self.state_file
  }

  fn state_error(&self, message: impl ToString) -> EnvironmentError {
    EnvironmentError::State {
      path: self.state_file.display().to_string(),
      message: message.to_string(),
    }
  }

  fn write_state(&self, profile: Option<&BuildProfile>) -> Result<(), EnvironmentError> {
    let state = ActiveProfileState {
      profile: profile.cloned(),
    };
    let content = serde_json::to_string_pretty(&state).map_err(|e| self.state_error(e))?;
    write_atomic(&self.state_file, content.as_bytes()).map_err(|e| self.state_error(e))
  }
}

impl BuildEnvironment for FileEnvironment {
  async fn current_profile(&self) -> Result<Option<BuildProfile>, EnvironmentError> {
    let content = match tokio::fs::read_to_string(&self.state_file).await {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(self.state_error(e)),
    };
    let state: ActiveProfileState = serde_json::from_str(&content).map_err(|e| self.state_error(e))?;
    Ok(state.profile)
  }

  async fn activate(&self, profile: Option<&BuildProfile>) -> Result<(), EnvironmentError> {
    self.write_state(profile)?;

    if let Some(refresh) = &self.refresh {
      let name = profile.map(|p| p.to_string()).unwrap_or_default();
      let argv = refresh.render(&BTreeMap::from([("profile", name.clone())]));
      let env = BTreeMap::from([("VPACK_PROFILE".to_string(), name)]);
      run_command(&argv, Some(&self.project_root), &env).await?;
    }

    info!(profile = ?profile, "environment settled");
    Ok(())
  }

  async fn check_prerequisites(&self) -> Result<(), EnvironmentError> {
    if self.prerequisites.is_empty() {
      return Ok(());
    }

    let manifest: PackagesManifest = match tokio::fs::read_to_string(&self.packages_manifest).await {
      Ok(content) => serde_json::from_str(&content).map_err(|e| EnvironmentError::State {
        path: self.packages_manifest.display().to_string(),
        message: e.to_string(),
      })?,
      Err(e) => {
        debug!(path = ?self.packages_manifest, error = %e, "packages manifest unavailable");
        PackagesManifest::default()
      }
    };

    match self
      .prerequisites
      .iter()
      .find(|p| !manifest.dependencies.contains_key(p.as_str()))
    {
      Some(package) => Err(EnvironmentError::MissingPrerequisite {
        package: package.clone(),
      }),
      None => Ok(()),
    }
  }

  fn restore_now(&self, profile: Option<&BuildProfile>) -> Result<(), EnvironmentError> {
    self.write_state(profile)
  }
}
