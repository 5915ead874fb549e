//! Content descriptors: what to build and for which platforms.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::platform::PlatformTarget;
use crate::scene::ContentType;

/// The three kinds of content a package can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentKind {
  World,
  PortableObject,
  Avatar,
}

impl ContentKind {
  /// Package file extension, also the bundler entry address.
  pub fn extension(&self) -> &'static str {
    match self {
      Self::World => "vmap",
      Self::PortableObject => "vobj",
      Self::Avatar => "vavt",
    }
  }

  /// Bundler group the source asset is placed in.
  pub fn group_name(&self) -> &'static str {
    match self {
      Self::World => "VivenMap",
      Self::PortableObject => "VivenObject",
      Self::Avatar => "VivenAvatar",
    }
  }

  /// Metadata key holding the content's display name.
  pub fn name_key(&self) -> &'static str {
    match self {
      Self::World => "mapName",
      Self::PortableObject => "objectName",
      Self::Avatar => "avatarName",
    }
  }

  /// Content-type tag forced onto the kind's network objects, if it has one.
  pub fn network_content_type(&self) -> Option<ContentType> {
    match self {
      Self::World => Some(ContentType::Prepared),
      Self::PortableObject => Some(ContentType::VObject),
      Self::Avatar => None,
    }
  }
}

impl fmt::Display for ContentKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::World => f.write_str("world"),
      Self::PortableObject => f.write_str("portable object"),
      Self::Avatar => f.write_str("avatar"),
    }
  }
}

/// A single manifest property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentProperty {
  pub key: String,
  pub value: String,
}

impl ContentProperty {
  pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      value: value.into(),
    }
  }
}

/// Per-platform enablement and source asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
  #[serde(default)]
  pub enabled: bool,
  #[serde(default)]
  pub source_path: String,
}

impl TargetSpec {
  pub fn enabled(source_path: impl Into<String>) -> Self {
    Self {
      enabled: true,
      source_path: source_path.into(),
    }
  }
}

/// A prefab bundled alongside a world, addressed by its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapObject {
  pub key: String,
  pub prefab: String,
}

/// The build request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDescriptor {
  pub kind: ContentKind,
  pub display_name: String,
  /// Ordered property list. Keys must be unique; duplicates are kept here so
  /// validation can report them.
  #[serde(default)]
  pub properties: Vec<ContentProperty>,
  #[serde(default)]
  pub targets: BTreeMap<PlatformTarget, TargetSpec>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content_version: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content_id: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub map_objects: Vec<MapObject>,
}

impl ContentDescriptor {
  pub fn new(kind: ContentKind, display_name: impl Into<String>) -> Self {
    Self {
      kind,
      display_name: display_name.into(),
      properties: Vec::new(),
      targets: BTreeMap::new(),
      content_version: None,
      content_id: None,
      map_objects: Vec::new(),
    }
  }

  pub fn with_target(mut self, platform: PlatformTarget, spec: TargetSpec) -> Self {
    self.targets.insert(platform, spec);
    self
  }

  pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.properties.push(ContentProperty::new(key, value));
    self
  }

  pub fn with_map_object(mut self, key: impl Into<String>, prefab: impl Into<String>) -> Self {
    self.map_objects.push(MapObject {
      key: key.into(),
      prefab: prefab.into(),
    });
    self
  }

  /// Enabled platforms in build order.
  pub fn enabled_platforms(&self) -> Vec<PlatformTarget> {
    PlatformTarget::ALL
      .into_iter()
      .filter(|p| self.targets.get(p).is_some_and(|t| t.enabled))
      .collect()
  }

  pub fn target(&self, platform: PlatformTarget) -> Option<&TargetSpec> {
    self.targets.get(&platform)
  }
}

/// Returns the first key that appears more than once.
pub fn find_duplicate_key(properties: &[ContentProperty]) -> Option<&str> {
  let mut seen = HashSet::new();
  properties
    .iter()
    .find(|p| !seen.insert(p.key.as_str()))
    .map(|p| p.key.as_str())
}
