//! Package manifest and build metadata, each with a companion hash file.
//!
//! A hash file holds the lowercase hex SHA-256 of the exact text written to
//! its primary file, so it changes exactly when that text changes.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;
use tracing::{debug, info};

use crate::content::{ContentDescriptor, ContentProperty, find_duplicate_key};
use crate::identity::UserIdentity;
use crate::platform::PlatformTarget;
use crate::util::hash::{ContentHash, hash_bytes};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_HASH_FILE: &str = "manifest.hash";
pub const METADATA_FILE: &str = "metadata.json";
pub const METADATA_HASH_FILE: &str = "metadata.hash";

/// Data type tag of every package this tool produces.
pub const CONTENT_DATA_TYPE: &str = "Addressable";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("duplicate manifest property key: {key}")]
  DuplicateKey { key: String },

  #[error("failed to serialize {file}: {source}")]
  Serialize {
    file: &'static str,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("hash mismatch for {file}: recorded {recorded}, actual {actual}")]
  HashMismatch {
    file: String,
    recorded: String,
    actual: String,
  },
}

/// The content manifest: a data type tag plus the property map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
  properties: Vec<ContentProperty>,
}

impl Manifest {
  /// Fails if two properties share a key.
  pub fn new(properties: Vec<ContentProperty>) -> Result<Self, ManifestError> {
    if let Some(key) = find_duplicate_key(&properties) {
      return Err(ManifestError::DuplicateKey { key: key.to_string() });
    }
    Ok(Self { properties })
  }

  pub fn properties(&self) -> &[ContentProperty] {
    &self.properties
  }

  pub fn to_json(&self) -> Result<String, ManifestError> {
    serde_json::to_string(self).map_err(|source| ManifestError::Serialize {
      file: MANIFEST_FILE,
      source,
    })
  }
}

struct PropertyMap<'a>(&'a [ContentProperty]);

impl Serialize for PropertyMap<'_> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.0.len()))?;
    for property in self.0 {
      map.serialize_entry(&property.key, &property.value)?;
    }
    map.end()
  }
}

impl Serialize for Manifest {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let len = if self.properties.is_empty() { 1 } else { 2 };
    let mut map = serializer.serialize_map(Some(len))?;
    map.serialize_entry("cttDataType", CONTENT_DATA_TYPE)?;
    if !self.properties.is_empty() {
      map.serialize_entry("cttProps", &PropertyMap(&self.properties))?;
    }
    map.end()
  }
}

/// Build metadata stamped at packaging time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
  pub date_and_time: String,
  pub creator: UserIdentity,
  pub build_type: String,
  pub name_key: &'static str,
  pub name: String,
  /// Platforms actually built, not the ones requested.
  pub available_platforms: Vec<PlatformTarget>,
  pub sdk_version: String,
  pub content_version: Option<String>,
}

impl Metadata {
  pub fn new(
    descriptor: &ContentDescriptor,
    creator: UserIdentity,
    built: &[PlatformTarget],
    now: DateTime<Local>,
  ) -> Self {
    Self {
      date_and_time: now.format(DATE_FORMAT).to_string(),
      creator,
      build_type: descriptor.kind.extension().to_string(),
      name_key: descriptor.kind.name_key(),
      name: descriptor.display_name.clone(),
      available_platforms: built.to_vec(),
      sdk_version: env!("CARGO_PKG_VERSION").to_string(),
      content_version: descriptor.content_version.clone(),
    }
  }

  pub fn to_json(&self) -> Result<String, ManifestError> {
    serde_json::to_string(self).map_err(|source| ManifestError::Serialize {
      file: METADATA_FILE,
      source,
    })
  }
}

impl Serialize for Metadata {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let platforms: Vec<&str> = self.available_platforms.iter().map(|p| p.display_name()).collect();
    let mut map = serializer.serialize_map(None)?;
    map.serialize_entry("dateAndTime", &self.date_and_time)?;
    map.serialize_entry("creatorId", &self.creator.user_id)?;
    map.serialize_entry("creatorNickname", &self.creator.nickname)?;
    map.serialize_entry("buildType", &self.build_type)?;
    map.serialize_entry(self.name_key, &self.name)?;
    map.serialize_entry("availablePlatforms", &platforms)?;
    map.serialize_entry("sdkVersion", &self.sdk_version)?;
    if let Some(version) = &self.content_version {
      map.serialize_entry("contentVersion", version)?;
    }
    map.end()
  }
}

/// Write `manifest.json` and `manifest.hash` into `root`.
pub fn write_manifest(root: &Path, properties: &[ContentProperty]) -> Result<ContentHash, ManifestError> {
  let manifest = Manifest::new(properties.to_vec())?;
  let hash = write_with_hash(root, MANIFEST_FILE, MANIFEST_HASH_FILE, &manifest.to_json()?)?;
  info!(path = ?root.join(MANIFEST_FILE), properties = properties.len(), "wrote manifest");
  Ok(hash)
}

/// Write `metadata.json` and `metadata.hash` into `root`.
pub fn write_metadata(root: &Path, metadata: &Metadata) -> Result<ContentHash, ManifestError> {
  let hash = write_with_hash(root, METADATA_FILE, METADATA_HASH_FILE, &metadata.to_json()?)?;
  info!(path = ?root.join(METADATA_FILE), platforms = ?metadata.available_platforms, "wrote metadata");
  Ok(hash)
}

fn write_with_hash(root: &Path, file: &str, hash_file: &str, text: &str) -> Result<ContentHash, ManifestError> {
  let write = |path: PathBuf, content: &str| {
    std::fs::write(&path, content).map_err(|source| ManifestError::Write { path, source })
  };

  write(root.join(file), text)?;
  let hash = hash_bytes(text.as_bytes());
  write(root.join(hash_file), &hash.0)?;
  debug!(file, hash = %hash, "wrote hash file");
  Ok(hash)
}

/// Compare `content` against the hash recorded for it.
pub fn check_hash(file: &str, content: &[u8], recorded: &str) -> Result<(), ManifestError> {
  let actual = hash_bytes(content);
  if actual.0 == recorded.trim() {
    Ok(())
  } else {
    Err(ManifestError::HashMismatch {
      file: file.to_string(),
      recorded: recorded.trim().to_string(),
      actual: actual.0,
    })
  }
}

/// Recheck both hash files in `root`.
pub fn verify(root: &Path) -> Result<(), ManifestError> {
  let read = |name: &str| {
    let path = root.join(name);
    std::fs::read(&path).map_err(|source| ManifestError::Read { path, source })
  };

  for (file, hash_file) in [(MANIFEST_FILE, MANIFEST_HASH_FILE), (METADATA_FILE, METADATA_HASH_FILE)] {
    let content = read(file)?;
    let recorded = String::from_utf8_lossy(&read(hash_file)?).into_owned();
    check_hash(file, &content, &recorded)?;
  }
  Ok(())
}
