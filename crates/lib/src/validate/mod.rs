//! Structural validation of content descriptors and their source assets.
//!
//! Validation never mutates its inputs. Recoverable problems (a network
//! object carrying the wrong content-type tag) are fixed on a copy of the
//! loaded graph and reported as [`Correction`]s; the caller decides whether
//! to persist the corrected graphs.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::content::{ContentDescriptor, ContentKind, ContentProperty, find_duplicate_key};
use crate::platform::PlatformTarget;
use crate::scene::{AssetError, AssetStore, Component, ContentType, SceneGraph};

#[derive(Debug, Error)]
pub enum ValidationError {
  #[error("content name is empty")]
  EmptyName,

  #[error("duplicate property key: {key}")]
  DuplicateProperty { key: String },

  #[error("content version '{version}' must be in X.Y.Z form (e.g. 0.0.1)")]
  InvalidVersion { version: String },

  #[error("content id '{id}' is not a GUID")]
  InvalidContentId { id: String },

  #[error("platform {platform} is enabled but has no source asset")]
  MissingSource { platform: PlatformTarget },

  #[error(transparent)]
  Asset(#[from] AssetError),

  #[error("{asset}: scene must not contain a camera (found on {node})")]
  Camera { asset: String, node: String },

  #[error("{asset}: scene must contain exactly one environment marker, found {count}")]
  EnvironmentMarker { asset: String, count: usize },

  #[error("{asset}: scene must not contain an event router (found on {node})")]
  EventRouter { asset: String, node: String },

  #[error("{asset}: network object on {node} has no object id")]
  MissingObjectId { asset: String, node: String },

  #[error("{asset}: object id {id} is used by more than one network object")]
  DuplicateObjectId { asset: String, id: String },

  #[error("{asset}: expected exactly one network object, found {count}")]
  NetworkObjectCount { asset: String, count: usize },

  #[error("{asset}: script on {node} is invalid: {reason}")]
  Script { asset: String, node: String, reason: String },

  #[error("{asset}: avatar marker component is missing")]
  MissingAvatarMarker { asset: String },

  #[error("{asset}: skeleton component is missing")]
  MissingSkeleton { asset: String },

  #[error("map object key '{key}' is not a valid non-nil GUID")]
  InvalidMapObjectKey { key: String },

  #[error("map object key '{key}' is used more than once")]
  DuplicateMapObjectKey { key: String },

  #[error("no platform selected")]
  NoPlatformSelected,

  #[error("build condition not met for {platform}")]
  BuildConditionNotMet { platform: PlatformTarget },
}

/// A recoverable fix applied to a copy of a source asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
  pub asset: String,
  pub node: String,
  pub from: Option<ContentType>,
  pub to: ContentType,
}

impl fmt::Display for Correction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.from {
      Some(from) => write!(f, "{}: {} content type {:?} -> {:?}", self.asset, self.node, from, self.to),
      None => write!(f, "{}: {} content type unset -> {:?}", self.asset, self.node, self.to),
    }
  }
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, Default)]
pub struct Validated {
  /// Every loaded asset, with corrections applied, keyed by project path.
  pub graphs: BTreeMap<String, SceneGraph>,
  pub corrections: Vec<Correction>,
  /// Manifest properties: a world's environment-marker properties first,
  /// then the descriptor's own.
  pub properties: Vec<ContentProperty>,
}

impl Validated {
  /// Graphs that were changed by a correction.
  pub fn corrected_graphs(&self) -> impl Iterator<Item = (&str, &SceneGraph)> {
    let touched: HashSet<&str> = self.corrections.iter().map(|c| c.asset.as_str()).collect();
    self
      .graphs
      .iter()
      .filter(move |(path, _)| touched.contains(path.as_str()))
      .map(|(path, graph)| (path.as_str(), graph))
  }
}

/// Validate a descriptor and every enabled platform's source asset.
pub fn validate(descriptor: &ContentDescriptor, store: &dyn AssetStore) -> Result<Validated, ValidationError> {
  check_descriptor(descriptor)?;

  let mut sources = Vec::new();
  for platform in descriptor.enabled_platforms() {
    let source = source_path(descriptor, platform)?;
    if !sources.contains(&source) {
      sources.push(source);
    }
  }

  let validated = validate_sources(descriptor, &sources, store)?;
  debug!(
    name = %descriptor.display_name,
    assets = validated.graphs.len(),
    corrections = validated.corrections.len(),
    "validation passed"
  );
  Ok(validated)
}

/// Re-check a single platform's source asset right before it is bundled.
pub fn validate_platform(
  descriptor: &ContentDescriptor,
  platform: PlatformTarget,
  store: &dyn AssetStore,
) -> Result<Validated, ValidationError> {
  check_descriptor(descriptor)?;
  let source = source_path(descriptor, platform)?;
  validate_sources(descriptor, &[source], store)
}

/// `X.Y.Z`, each part one or more ASCII digits.
pub fn is_valid_version(version: &str) -> bool {
  let parts: Vec<&str> = version.split('.').collect();
  parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

/// Hyphenated 8-4-4-4-12 GUID.
pub fn is_guid(id: &str) -> bool {
  id.len() == 36 && Uuid::try_parse(id).is_ok()
}

fn is_missing_id(id: &str) -> bool {
  let id = id.trim();
  id.is_empty() || Uuid::try_parse(id).is_ok_and(|u| u.is_nil())
}

fn check_descriptor(descriptor: &ContentDescriptor) -> Result<(), ValidationError> {
  if descriptor.display_name.trim().is_empty() {
    return Err(ValidationError::EmptyName);
  }
  if let Some(key) = find_duplicate_key(&descriptor.properties) {
    return Err(ValidationError::DuplicateProperty { key: key.to_string() });
  }
  if let Some(version) = &descriptor.content_version
    && !is_valid_version(version)
  {
    return Err(ValidationError::InvalidVersion {
      version: version.clone(),
    });
  }
  if let Some(id) = &descriptor.content_id
    && !is_guid(id)
  {
    return Err(ValidationError::InvalidContentId { id: id.clone() });
  }
  Ok(())
}

fn source_path(descriptor: &ContentDescriptor, platform: PlatformTarget) -> Result<String, ValidationError> {
  descriptor
    .target(platform)
    .map(|t| t.source_path.trim())
    .filter(|s| !s.is_empty())
    .map(str::to_string)
    .ok_or(ValidationError::MissingSource { platform })
}

fn validate_sources(
  descriptor: &ContentDescriptor,
  sources: &[String],
  store: &dyn AssetStore,
) -> Result<Validated, ValidationError> {
  let mut validated = Validated::default();
  let mut marker_properties = None;

  for source in sources {
    let mut graph = store.load(source)?;
    match descriptor.kind {
      ContentKind::World => {
        check_world(source, &graph)?;
        if marker_properties.is_none() {
          marker_properties = Some(environment_properties(&graph));
        }
      }
      ContentKind::PortableObject => check_portable_object(source, &graph)?,
      ContentKind::Avatar => check_avatar(source, &graph)?,
    }
    if let Some(tag) = descriptor.kind.network_content_type() {
      force_network_objects(source, &mut graph, tag, &mut validated.corrections)?;
      check_scripts(source, &graph)?;
    }
    validated.graphs.insert(source.clone(), graph);
  }

  if descriptor.kind == ContentKind::World {
    check_map_objects(descriptor, store, &mut validated)?;
  }

  validated.properties = marker_properties.unwrap_or_default();
  validated.properties.extend(descriptor.properties.iter().cloned());
  Ok(validated)
}

fn check_world(asset: &str, graph: &SceneGraph) -> Result<(), ValidationError> {
  if let Some(node) = first_node(graph, |c| matches!(c, Component::Camera)) {
    return Err(ValidationError::Camera {
      asset: asset.to_string(),
      node,
    });
  }

  let count = graph.count(|c| matches!(c, Component::EnvironmentMarker { .. }));
  if count != 1 {
    return Err(ValidationError::EnvironmentMarker {
      asset: asset.to_string(),
      count,
    });
  }

  if let Some(node) = first_node(graph, |c| matches!(c, Component::EventRouter)) {
    return Err(ValidationError::EventRouter {
      asset: asset.to_string(),
      node,
    });
  }

  Ok(())
}

fn check_portable_object(asset: &str, graph: &SceneGraph) -> Result<(), ValidationError> {
  let count = graph.count(|c| matches!(c, Component::NetworkObject { .. }));
  if count != 1 {
    return Err(ValidationError::NetworkObjectCount {
      asset: asset.to_string(),
      count,
    });
  }

  Ok(())
}

fn check_avatar(asset: &str, graph: &SceneGraph) -> Result<(), ValidationError> {
  if !graph.contains(|c| matches!(c, Component::AvatarMarker)) {
    return Err(ValidationError::MissingAvatarMarker {
      asset: asset.to_string(),
    });
  }
  if !graph.contains(|c| matches!(c, Component::Skeleton)) {
    return Err(ValidationError::MissingSkeleton {
      asset: asset.to_string(),
    });
  }
  Ok(())
}

fn check_map_objects(
  descriptor: &ContentDescriptor,
  store: &dyn AssetStore,
  validated: &mut Validated,
) -> Result<(), ValidationError> {
  let mut keys = HashSet::new();
  for object in &descriptor.map_objects {
    if !is_guid(&object.key) || is_missing_id(&object.key) {
      return Err(ValidationError::InvalidMapObjectKey {
        key: object.key.clone(),
      });
    }
    if !keys.insert(object.key.to_ascii_lowercase()) {
      return Err(ValidationError::DuplicateMapObjectKey {
        key: object.key.clone(),
      });
    }

    let mut prefab = store.load(&object.prefab)?;
    force_network_objects(&object.prefab, &mut prefab, ContentType::MapContent, &mut validated.corrections)?;
    validated.graphs.insert(object.prefab.clone(), prefab);
  }
  Ok(())
}

/// Force every network object to `expected` and require unique, non-nil ids.
fn force_network_objects(
  asset: &str,
  graph: &mut SceneGraph,
  expected: ContentType,
  corrections: &mut Vec<Correction>,
) -> Result<(), ValidationError> {
  let mut failure = None;
  let mut ids = HashSet::new();

  graph.for_each_component_mut(|node, component| {
    let Component::NetworkObject {
      content_type,
      object_id,
    } = component
    else {
      return;
    };

    if *content_type != Some(expected) {
      warn!(asset, node = %node, to = ?expected, "correcting network object content type");
      corrections.push(Correction {
        asset: asset.to_string(),
        node: node.clone(),
        from: *content_type,
        to: expected,
      });
      *content_type = Some(expected);
    }

    if failure.is_some() {
      return;
    }
    if is_missing_id(object_id) {
      failure = Some(ValidationError::MissingObjectId {
        asset: asset.to_string(),
        node,
      });
    } else if !ids.insert(object_id.trim().to_ascii_lowercase()) {
      failure = Some(ValidationError::DuplicateObjectId {
        asset: asset.to_string(),
        id: object_id.clone(),
      });
    }
  });

  failure.map_or(Ok(()), Err)
}

fn check_scripts(asset: &str, graph: &SceneGraph) -> Result<(), ValidationError> {
  let mut failure = None;
  graph.for_each_component(|node, component| {
    if failure.is_some() {
      return;
    }
    let Component::Script { script, injections } = component else {
      return;
    };

    let reason = if script.as_deref().is_none_or(|s| s.trim().is_empty()) {
      Some("no script assigned".to_string())
    } else {
      injections
        .iter()
        .find(|i| i.value.as_deref().is_none_or(|v| v.is_empty() || v == "null"))
        .map(|i| format!("injection '{}' has no value", i.name))
    };

    if let Some(reason) = reason {
      failure = Some(ValidationError::Script {
        asset: asset.to_string(),
        node,
        reason,
      });
    }
  });

  failure.map_or(Ok(()), Err)
}

fn first_node(graph: &SceneGraph, pred: impl Fn(&Component) -> bool) -> Option<String> {
  let mut found = None;
  graph.for_each_component(|node, component| {
    if found.is_none() && pred(component) {
      found = Some(node);
    }
  });
  found
}

fn environment_properties(graph: &SceneGraph) -> Vec<ContentProperty> {
  let mut properties = Vec::new();
  graph.for_each_component(|_, component| {
    if let Component::EnvironmentMarker { properties: p } = component {
      properties.extend(p.iter().cloned());
    }
  });
  properties
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::content::TargetSpec;
  use crate::scene::{Injection, Node};
  use crate::util::testutil::{MemoryAssetStore, avatar_prefab, object_prefab, world_scene};

  const SCENE: &str = "/scenes/plaza.scene";
  const ID_A: &str = "3de31e8d-17af-4834-af7d-ebe37009b82b";
  const ID_B: &str = "9b2e6a47-52c1-4f0e-8d0a-6f3c1e2d4b5a";

  fn world(store: &MemoryAssetStore, graph: SceneGraph) -> ContentDescriptor {
    store.insert(SCENE, graph);
    ContentDescriptor::new(ContentKind::World, "Plaza").with_target(PlatformTarget::Win, TargetSpec::enabled(SCENE))
  }

  #[test]
  fn valid_world_passes_and_forces_prepared() {
    let store = MemoryAssetStore::new();
    let descriptor = world(&store, world_scene(&[(ID_A, None)]));

    let validated = validate(&descriptor, &store).unwrap();

    assert_eq!(validated.corrections.len(), 1);
    assert_eq!(validated.corrections[0].to, ContentType::Prepared);
    let graph = &validated.graphs[SCENE];
    assert!(graph.contains(|c| matches!(
      c,
      Component::NetworkObject {
        content_type: Some(ContentType::Prepared),
        ..
      }
    )));
    // the store copy is untouched
    assert_eq!(store.get(SCENE).unwrap(), world_scene(&[(ID_A, None)]));
  }

  #[test]
  fn camera_is_fatal() {
    let store = MemoryAssetStore::new();
    let mut scene = world_scene(&[]);
    scene.roots.push(Node::new("Main Camera").with_component(Component::Camera));
    let descriptor = world(&store, scene);

    let err = validate(&descriptor, &store).unwrap_err();
    assert!(matches!(err, ValidationError::Camera { .. }));
    assert!(err.to_string().contains("camera"));
  }

  #[test]
  fn event_router_is_fatal() {
    let store = MemoryAssetStore::new();
    let mut scene = world_scene(&[]);
    scene.roots.push(Node::new("EventSystem").with_component(Component::EventRouter));
    let descriptor = world(&store, scene);

    assert!(matches!(
      validate(&descriptor, &store),
      Err(ValidationError::EventRouter { .. })
    ));
  }

  #[test]
  fn world_needs_exactly_one_environment_marker() {
    let store = MemoryAssetStore::new();
    let mut scene = world_scene(&[]);
    scene.roots.push(Node::new("Second").with_component(Component::EnvironmentMarker { properties: vec![] }));
    let descriptor = world(&store, scene);

    assert!(matches!(
      validate(&descriptor, &store),
      Err(ValidationError::EnvironmentMarker { count: 2, .. })
    ));

    let descriptor = world(&store, SceneGraph::new(vec![Node::new("Empty")]));
    assert!(matches!(
      validate(&descriptor, &store),
      Err(ValidationError::EnvironmentMarker { count: 0, .. })
    ));
  }

  #[test]
  fn nil_and_duplicate_object_ids_are_fatal() {
    let store = MemoryAssetStore::new();
    let descriptor = world(&store, world_scene(&[(&Uuid::nil().to_string(), None)]));
    assert!(matches!(
      validate(&descriptor, &store),
      Err(ValidationError::MissingObjectId { .. })
    ));

    let descriptor = world(&store, world_scene(&[(ID_A, None), (ID_A, None)]));
    assert!(matches!(
      validate(&descriptor, &store),
      Err(ValidationError::DuplicateObjectId { .. })
    ));
  }

  #[test]
  fn duplicate_descriptor_keys_are_fatal() {
    let store = MemoryAssetStore::new();
    let descriptor = world(&store, world_scene(&[]))
      .with_property("theme", "day")
      .with_property("theme", "night");

    let err = validate(&descriptor, &store).unwrap_err();
    assert!(matches!(err, ValidationError::DuplicateProperty { key } if key == "theme"));
  }

  #[test]
  fn version_and_content_id_formats() {
    assert!(is_valid_version("0.0.1"));
    assert!(is_valid_version("10.20.30"));
    assert!(!is_valid_version("1.0"));
    assert!(!is_valid_version("1.0.x"));
    assert!(!is_valid_version("1..0"));

    assert!(is_guid(ID_A));
    assert!(!is_guid("3de31e8d17af4834af7debe37009b82b"));
    assert!(!is_guid("not-a-guid"));
  }

  #[test]
  fn enabled_target_without_source_is_fatal() {
    let store = MemoryAssetStore::new();
    let descriptor = ContentDescriptor::new(ContentKind::World, "Plaza").with_target(
      PlatformTarget::Aos,
      TargetSpec {
        enabled: true,
        source_path: " ".into(),
      },
    );

    assert!(matches!(
      validate(&descriptor, &store),
      Err(ValidationError::MissingSource {
        platform: PlatformTarget::Aos
      })
    ));
  }

  #[test]
  fn missing_asset_is_reported() {
    let store = MemoryAssetStore::new();
    let descriptor = ContentDescriptor::new(ContentKind::World, "Plaza")
      .with_target(PlatformTarget::Win, TargetSpec::enabled("/scenes/missing.scene"));

    assert!(matches!(
      validate(&descriptor, &store),
      Err(ValidationError::Asset(AssetError::NotFound { .. }))
    ));
  }

  #[test]
  fn portable_object_needs_exactly_one_network_object() {
    let store = MemoryAssetStore::new();
    store.insert("/prefabs/lamp.prefab", object_prefab(ID_A));
    let descriptor = ContentDescriptor::new(ContentKind::PortableObject, "Lamp")
      .with_target(PlatformTarget::Win, TargetSpec::enabled("/prefabs/lamp.prefab"));

    let validated = validate(&descriptor, &store).unwrap();
    assert_eq!(validated.corrections[0].to, ContentType::VObject);

    let mut two = object_prefab(ID_A);
    two.roots[0]
      .children
      .push(Node::new("Extra").with_component(Component::network_object(None, ID_B)));
    store.insert("/prefabs/lamp.prefab", two);
    assert!(matches!(
      validate(&descriptor, &store),
      Err(ValidationError::NetworkObjectCount { count: 2, .. })
    ));
  }

  #[test]
  fn script_with_unset_injection_is_fatal() {
    let store = MemoryAssetStore::new();
    let mut prefab = object_prefab(ID_A);
    prefab.roots[0].components.push(Component::Script {
      script: Some("lamp.lua".into()),
      injections: vec![Injection {
        name: "bulb".into(),
        value: None,
      }],
    });
    store.insert("/prefabs/lamp.prefab", prefab);
    let descriptor = ContentDescriptor::new(ContentKind::PortableObject, "Lamp")
      .with_target(PlatformTarget::Win, TargetSpec::enabled("/prefabs/lamp.prefab"));

    let err = validate(&descriptor, &store).unwrap_err();
    assert!(err.to_string().contains("bulb"), "{err}");
  }

  #[test]
  fn avatar_requires_marker_and_skeleton() {
    let store = MemoryAssetStore::new();
    store.insert("/avatars/me.prefab", avatar_prefab());
    let descriptor = ContentDescriptor::new(ContentKind::Avatar, "Me")
      .with_target(PlatformTarget::Win, TargetSpec::enabled("/avatars/me.prefab"));
    assert!(validate(&descriptor, &store).is_ok());

    store.insert(
      "/avatars/me.prefab",
      SceneGraph::new(vec![Node::new("Me").with_component(Component::AvatarMarker)]),
    );
    assert!(matches!(
      validate(&descriptor, &store),
      Err(ValidationError::MissingSkeleton { .. })
    ));

    store.insert(
      "/avatars/me.prefab",
      SceneGraph::new(vec![Node::new("Me").with_component(Component::Skeleton)]),
    );
    assert!(matches!(
      validate(&descriptor, &store),
      Err(ValidationError::MissingAvatarMarker { .. })
    ));
  }

  #[test]
  fn avatar_network_objects_are_left_untagged() {
    let store = MemoryAssetStore::new();
    let mut avatar = avatar_prefab();
    avatar.roots[0]
      .children
      .push(Node::new("Badge").with_component(Component::network_object(None, ID_A)));
    store.insert("/avatars/me.prefab", avatar);
    let descriptor = ContentDescriptor::new(ContentKind::Avatar, "Me")
      .with_target(PlatformTarget::Win, TargetSpec::enabled("/avatars/me.prefab"));

    let validated = validate(&descriptor, &store).unwrap();

    assert!(validated.corrections.is_empty());
    assert_eq!(validated.corrected_graphs().count(), 0);
  }

  #[test]
  fn map_objects_are_checked_and_forced_to_map_content() {
    let store = MemoryAssetStore::new();
    store.insert("/prefabs/chair.prefab", object_prefab(ID_B));
    let descriptor = world(&store, world_scene(&[])).with_map_object(ID_A, "/prefabs/chair.prefab");

    let validated = validate(&descriptor, &store).unwrap();
    assert!(
      validated
        .corrections
        .iter()
        .any(|c| c.asset == "/prefabs/chair.prefab" && c.to == ContentType::MapContent)
    );

    let bad = world(&store, world_scene(&[])).with_map_object("chair", "/prefabs/chair.prefab");
    assert!(matches!(
      validate(&bad, &store),
      Err(ValidationError::InvalidMapObjectKey { .. })
    ));

    let nil = world(&store, world_scene(&[])).with_map_object(Uuid::nil().to_string(), "/prefabs/chair.prefab");
    assert!(matches!(
      validate(&nil, &store),
      Err(ValidationError::InvalidMapObjectKey { .. })
    ));
  }

  #[test]
  fn environment_properties_come_first() {
    let store = MemoryAssetStore::new();
    let mut scene = world_scene(&[]);
    scene.roots[0].components = vec![Component::EnvironmentMarker {
      properties: vec![ContentProperty::new("skybox", "sunset")],
    }];
    let descriptor = world(&store, scene).with_property("theme", "day");

    let validated = validate(&descriptor, &store).unwrap();
    let keys: Vec<_> = validated.properties.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(keys, vec!["skybox", "theme"]);
  }

  #[test]
  fn platform_recheck_only_loads_that_source() {
    let store = MemoryAssetStore::new();
    store.insert("/scenes/mobile.scene", world_scene(&[]));
    let descriptor = world(&store, world_scene(&[]))
      .with_target(PlatformTarget::Aos, TargetSpec::enabled("/scenes/mobile.scene"));

    let validated = validate_platform(&descriptor, PlatformTarget::Aos, &store).unwrap();
    assert_eq!(validated.graphs.keys().collect::<Vec<_>>(), vec!["/scenes/mobile.scene"]);
  }
}
