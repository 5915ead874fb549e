//! The staging root a build run assembles its package in.
//!
//! Each platform's raw bundler output is moved into `<root>/<dir_name>`.
//! Bundlers name their output after the native build target, which can
//! differ from the canonical directory only by case (`iOS` vs `ios`). A
//! direct rename between such paths is a no-op on case-insensitive
//! filesystems, so relocation always goes through a uniquely named
//! intermediate directory.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::consts::RELOCATE_SUFFIX;
use crate::platform::PlatformTarget;
use crate::util::fs::{is_populated_dir, move_dir, remove_dir_if_exists};

#[derive(Debug, Error)]
pub enum RelocationError {
  #[error("failed to prepare staging directory {path}: {source}")]
  Prepare {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("bundler output directory {path} does not exist")]
  MissingOutput { path: PathBuf },

  #[error("destination {path} is already populated")]
  DestinationPopulated { path: PathBuf },

  #[error("failed to move {from} to {to}: {source}")]
  Move {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to remove {path}: {source}")]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// What happens to the staging root after a failed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StagingPolicy {
  /// Leave partial output on disk for inspection.
  #[default]
  KeepOnFailure,
  PurgeOnFailure,
}

#[derive(Debug, Clone)]
pub struct StagingManager {
  root: PathBuf,
}

impl StagingManager {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn platform_dir(&self, platform: PlatformTarget) -> PathBuf {
    self.root.join(platform.dir_name())
  }

  /// Recreate the staging root, deleting anything left from an earlier run.
  pub async fn prepare(&self) -> Result<(), RelocationError> {
    let prepare_err = |source| RelocationError::Prepare {
      path: self.root.clone(),
      source,
    };
    if remove_dir_if_exists(&self.root).await.map_err(prepare_err)? {
      debug!(path = ?self.root, "removed stale staging root");
    }
    fs::create_dir_all(&self.root).await.map_err(prepare_err)?;
    info!(path = ?self.root, "staging root ready");
    Ok(())
  }

  /// Create the root if missing, keeping existing content.
  pub async fn ensure(&self) -> Result<(), RelocationError> {
    fs::create_dir_all(&self.root).await.map_err(|source| RelocationError::Prepare {
      path: self.root.clone(),
      source,
    })
  }

  /// Remove a leftover canonical folder for `platform`.
  pub async fn clear_platform(&self, platform: PlatformTarget) -> Result<(), RelocationError> {
    let dir = self.platform_dir(platform);
    let removed = remove_dir_if_exists(&dir)
      .await
      .map_err(|source| RelocationError::Remove { path: dir.clone(), source })?;
    if removed {
      debug!(platform = %platform, path = ?dir, "removed leftover platform directory");
    }
    Ok(())
  }

  /// Move raw bundler output into the canonical directory for `platform`.
  pub async fn relocate(&self, raw: &Path, platform: PlatformTarget) -> Result<PathBuf, RelocationError> {
    if !raw.is_dir() {
      return Err(RelocationError::MissingOutput { path: raw.to_path_buf() });
    }
    self.ensure().await?;

    let dest = self.platform_dir(platform);
    let same_dir = same_path_ignoring_case(raw, &dest);
    if !same_dir && is_populated_dir(&dest) {
      return Err(RelocationError::DestinationPopulated { path: dest });
    }
    if !same_dir && dest.is_dir() {
      fs::remove_dir(&dest)
        .await
        .map_err(|source| RelocationError::Remove { path: dest.clone(), source })?;
    }

    let temp = self
      .root
      .join(format!(".{}-{}.{}", platform.dir_name(), Uuid::new_v4(), RELOCATE_SUFFIX));

    move_dir(raw, &temp).await.map_err(|source| RelocationError::Move {
      from: raw.to_path_buf(),
      to: temp.clone(),
      source,
    })?;

    // Anything at dest now would be a second directory racing this run.
    if dest.exists() {
      return Err(RelocationError::DestinationPopulated { path: dest });
    }

    move_dir(&temp, &dest).await.map_err(|source| RelocationError::Move {
      from: temp.clone(),
      to: dest.clone(),
      source,
    })?;

    info!(platform = %platform, from = ?raw, to = ?dest, "relocated bundler output");
    Ok(dest)
  }

  /// Delete the staging root.
  pub async fn purge(&self) -> Result<(), RelocationError> {
    remove_dir_if_exists(&self.root)
      .await
      .map_err(|source| RelocationError::Remove {
        path: self.root.clone(),
        source,
      })?;
    debug!(path = ?self.root, "staging root purged");
    Ok(())
  }

  /// Platforms whose canonical directory is present and populated, in build order.
  pub fn present_platforms(&self) -> Vec<PlatformTarget> {
    PlatformTarget::ALL
      .into_iter()
      .filter(|p| is_populated_dir(&self.platform_dir(*p)))
      .collect()
  }

  /// Delete every entry of the root that is not a canonical platform directory.
  pub async fn retain_platform_dirs(&self) -> Result<(), RelocationError> {
    let mut entries = fs::read_dir(&self.root).await.map_err(|source| RelocationError::Prepare {
      path: self.root.clone(),
      source,
    })?;

    while let Some(entry) = entries.next_entry().await.map_err(|source| RelocationError::Prepare {
      path: self.root.clone(),
      source,
    })? {
      let name = entry.file_name();
      let keep = PlatformTarget::ALL.iter().any(|p| name.to_str() == Some(p.dir_name()));
      if keep {
        continue;
      }

      let path = entry.path();
      let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
      let result = if is_dir {
        fs::remove_dir_all(&path).await
      } else {
        fs::remove_file(&path).await
      };
      result.map_err(|source| RelocationError::Remove { path: path.clone(), source })?;
      debug!(path = ?path, "removed non-platform entry");
    }
    Ok(())
  }
}

fn same_path_ignoring_case(a: &Path, b: &Path) -> bool {
  a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}
