//! Scene graphs and the asset store they are loaded from.
//!
//! A source asset (a world scene, an object prefab, an avatar prefab) is a
//! tree of named nodes, each carrying a list of components. Validation only
//! needs to know which components exist and a few of their fields, so the
//! model stays deliberately small.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::content::ContentProperty;
use crate::util::fs::write_atomic;

/// Content-type tag carried by a network-synchronized object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
  Prepared,
  VObject,
  MapContent,
}

/// A named value wired into a script by the author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Injection {
  pub name: String,
  #[serde(default)]
  pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Component {
  /// Root marker every world needs exactly one of.
  EnvironmentMarker {
    #[serde(default)]
    properties: Vec<ContentProperty>,
  },
  Camera,
  /// Global event-routing singleton.
  EventRouter,
  #[serde(rename_all = "camelCase")]
  NetworkObject {
    #[serde(default)]
    content_type: Option<ContentType>,
    #[serde(default)]
    object_id: String,
  },
  Script {
    #[serde(default)]
    script: Option<String>,
    #[serde(default)]
    injections: Vec<Injection>,
  },
  Skeleton,
  AvatarMarker,
  Other {
    name: String,
  },
}

impl Component {
  pub fn network_object(content_type: Option<ContentType>, object_id: impl Into<String>) -> Self {
    Self::NetworkObject {
      content_type,
      object_id: object_id.into(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
  pub name: String,
  #[serde(default)]
  pub components: Vec<Component>,
  #[serde(default)]
  pub children: Vec<Node>,
}

impl Node {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Default::default()
    }
  }

  pub fn with_component(mut self, component: Component) -> Self {
    self.components.push(component);
    self
  }

  pub fn with_child(mut self, child: Node) -> Self {
    self.children.push(child);
    self
  }

  fn visit<'a>(&'a self, path: &mut Vec<&'a str>, f: &mut dyn FnMut(&[&'a str], &'a Component)) {
    path.push(&self.name);
    for component in &self.components {
      f(path, component);
    }
    for child in &self.children {
      child.visit(path, f);
    }
    path.pop();
  }

  fn visit_mut(&mut self, path: &mut Vec<String>, f: &mut dyn FnMut(&[String], &mut Component)) {
    path.push(self.name.clone());
    for component in &mut self.components {
      f(path, component);
    }
    for child in &mut self.children {
      child.visit_mut(path, f);
    }
    path.pop();
  }
}

/// A loaded source asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneGraph {
  #[serde(default)]
  pub roots: Vec<Node>,
}

impl SceneGraph {
  pub fn new(roots: Vec<Node>) -> Self {
    Self { roots }
  }

  /// Visit every component depth-first, with the slash-joined node path.
  pub fn for_each_component<'a>(&'a self, mut f: impl FnMut(String, &'a Component)) {
    let mut path = Vec::new();
    for root in &self.roots {
      root.visit(&mut path, &mut |p, c| f(p.join("/"), c));
    }
  }

  pub fn for_each_component_mut(&mut self, mut f: impl FnMut(String, &mut Component)) {
    let mut path = Vec::new();
    for root in &mut self.roots {
      root.visit_mut(&mut path, &mut |p, c| f(p.join("/"), c));
    }
  }

  pub fn count(&self, pred: impl Fn(&Component) -> bool) -> usize {
    let mut n = 0;
    self.for_each_component(|_, c| {
      if pred(c) {
        n += 1;
      }
    });
    n
  }

  pub fn contains(&self, pred: impl Fn(&Component) -> bool) -> bool {
    self.count(pred) > 0
  }
}

#[derive(Debug, Error)]
pub enum AssetError {
  #[error("asset not found: {path}")]
  NotFound { path: String },

  #[error("failed to read asset {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse asset {path}: {source}")]
  Parse {
    path: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to write asset {path}: {source}")]
  Write {
    path: String,
    #[source]
    source: io::Error,
  },
}

/// Loads and persists source assets by their project path.
pub trait AssetStore: Send + Sync {
  fn load(&self, path: &str) -> Result<SceneGraph, AssetError>;

  fn save(&self, path: &str, graph: &SceneGraph) -> Result<(), AssetError>;
}

/// Asset store backed by JSON files under a project root.
///
/// Project paths are rooted at the store root, so `/scenes/plaza.scene` and
/// `scenes/plaza.scene` name the same file.
#[derive(Debug, Clone)]
pub struct FsAssetStore {
  root: PathBuf,
}

impl FsAssetStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn resolve(&self, path: &str) -> PathBuf {
    self.root.join(path.trim_start_matches(['/', '\\']))
  }
}

impl AssetStore for FsAssetStore {
  fn load(&self, path: &str) -> Result<SceneGraph, AssetError> {
    let file = self.resolve(path);
    let content = std::fs::read_to_string(&file).map_err(|source| match source.kind() {
      io::ErrorKind::NotFound => AssetError::NotFound { path: path.to_string() },
      _ => AssetError::Read {
        path: path.to_string(),
        source,
      },
    })?;
    serde_json::from_str(&content).map_err(|source| AssetError::Parse {
      path: path.to_string(),
      source,
    })
  }

  fn save(&self, path: &str, graph: &SceneGraph) -> Result<(), AssetError> {
    let write_err = |source| AssetError::Write {
      path: path.to_string(),
      source,
    };
    let content = serde_json::to_string_pretty(graph).map_err(|e| write_err(io::Error::other(e)))?;
    write_atomic(&self.resolve(path), content.as_bytes()).map_err(write_err)
  }
}
