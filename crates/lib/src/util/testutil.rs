//! Test doubles for the pipeline's collaborators.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::build::BuildObserver;
use crate::bundle::{BundleRequest, Bundler, BundlerError, versioned_catalog_file};
use crate::consts::DEFAULT_CATALOG_FILE;
use crate::content::ContentKind;
use crate::platform::PlatformTarget;
use crate::scene::{AssetError, AssetStore, Component, ContentType, Node, SceneGraph};
use crate::util::cmd::CommandError;

/// Asset store holding graphs in memory.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
  graphs: Mutex<HashMap<String, SceneGraph>>,
  saves: Mutex<Vec<String>>,
}

impl MemoryAssetStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&self, path: &str, graph: SceneGraph) {
    self.graphs.lock().unwrap().insert(path.to_string(), graph);
  }

  pub fn get(&self, path: &str) -> Option<SceneGraph> {
    self.graphs.lock().unwrap().get(path).cloned()
  }

  /// Paths passed to `save`, in order.
  pub fn saved(&self) -> Vec<String> {
    self.saves.lock().unwrap().clone()
  }
}

impl AssetStore for MemoryAssetStore {
  fn load(&self, path: &str) -> Result<SceneGraph, AssetError> {
    self.get(path).ok_or_else(|| AssetError::NotFound { path: path.to_string() })
  }

  fn save(&self, path: &str, graph: &SceneGraph) -> Result<(), AssetError> {
    self.saves.lock().unwrap().push(path.to_string());
    self.insert(path, graph.clone());
    Ok(())
  }
}

/// A world scene: one environment marker plus the given network objects.
pub fn world_scene(objects: &[(&str, Option<ContentType>)]) -> SceneGraph {
  let mut root = Node::new("Environment").with_component(Component::EnvironmentMarker { properties: vec![] });
  for (i, (id, content_type)) in objects.iter().enumerate() {
    root = root.with_child(Node::new(format!("Object{i}")).with_component(Component::network_object(*content_type, *id)));
  }
  SceneGraph::new(vec![root])
}

/// A portable object prefab with one untagged network object.
pub fn object_prefab(id: &str) -> SceneGraph {
  SceneGraph::new(vec![
    Node::new("Prefab").with_component(Component::network_object(None, id)),
  ])
}

pub fn avatar_prefab() -> SceneGraph {
  SceneGraph::new(vec![
    Node::new("Avatar")
      .with_component(Component::AvatarMarker)
      .with_child(Node::new("Armature").with_component(Component::Skeleton)),
  ])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
  Succeed,
  Fail,
  Panic,
  SkipCatalog,
}

/// Bundler that writes a fake catalog under `<out>/<bundler target>`.
#[derive(Debug, Default)]
pub struct ScriptedBundler {
  calls: Mutex<Vec<PlatformTarget>>,
  requests: Mutex<Vec<BundleRequest>>,
  overrides: HashMap<PlatformTarget, Script>,
}

impl ScriptedBundler {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn on(mut self, platform: PlatformTarget, script: Script) -> Self {
    self.overrides.insert(platform, script);
    self
  }

  pub fn calls(&self) -> Vec<PlatformTarget> {
    self.calls.lock().unwrap().clone()
  }

  pub fn requests(&self) -> Vec<BundleRequest> {
    self.requests.lock().unwrap().clone()
  }
}

impl Bundler for ScriptedBundler {
  async fn bundle(&self, request: &BundleRequest) -> Result<PathBuf, BundlerError> {
    self.calls.lock().unwrap().push(request.platform);
    self.requests.lock().unwrap().push(request.clone());

    let script = self.overrides.get(&request.platform).copied().unwrap_or(Script::Succeed);
    match script {
      Script::Fail => {
        return Err(BundlerError::Command(CommandError::Failed {
          cmd: format!("bundle {}", request.platform),
          code: Some(1),
          stderr: "scripted failure".into(),
        }));
      }
      Script::Panic => panic!("bundler exploded on {}", request.platform),
      Script::Succeed | Script::SkipCatalog => {}
    }

    let out = request.output_root.join(request.platform.bundler_target());
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("content.bundle"), &request.group).unwrap();
    if script != Script::SkipCatalog {
      let catalog = match &request.player_version {
        Some(version) => versioned_catalog_file(version),
        None => DEFAULT_CATALOG_FILE.to_string(),
      };
      std::fs::write(out.join(catalog), "{}").unwrap();
    }
    Ok(out)
  }
}

/// Observer recording every hook call.
#[derive(Debug, Default)]
pub struct RecordingObserver {
  events: Mutex<Vec<String>>,
  deny: Option<PlatformTarget>,
}

impl RecordingObserver {
  pub fn denying(platform: PlatformTarget) -> Self {
    Self {
      deny: Some(platform),
      ..Default::default()
    }
  }

  pub fn events(&self) -> Vec<String> {
    self.events.lock().unwrap().clone()
  }

  fn record(&self, event: String) {
    self.events.lock().unwrap().push(event);
  }
}

impl BuildObserver for RecordingObserver {
  fn platform_changed(&self, platform: PlatformTarget) {
    self.record(format!("changed:{platform}"));
  }

  fn build_condition(&self, _kind: ContentKind, platform: PlatformTarget) -> bool {
    self.deny != Some(platform)
  }

  fn bundle_started(&self, request: &BundleRequest) {
    self.record(format!("started:{}", request.platform));
  }

  fn bundle_finished(&self, platform: PlatformTarget, _output: &Path) {
    self.record(format!("finished:{platform}"));
  }
}
