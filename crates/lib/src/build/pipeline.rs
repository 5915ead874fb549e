//! The build orchestrator.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use futures::FutureExt;
use tokio::fs;
use tracing::{debug, error, info, warn};

use super::observer::{BuildObserver, NoopObserver};
use super::types::{BuildError, BuildOptions, BuildResult};
use crate::archive::{self, ArchiveError};
use crate::bundle::{AssetEntry, BundleRequest, Bundler, verify_catalog, versioned_catalog_file};
use crate::consts::{LOCAL_TEST_PLAYER_VERSION, RELOAD_TRIGGER_FILE};
use crate::content::{ContentDescriptor, ContentKind};
use crate::env::{BuildEnvironment, EnvironmentError, ProfileCheckout};
use crate::identity::{EnvIdentity, IdentityProvider, resolve_identity};
use crate::manifest::{Manifest, Metadata, write_manifest, write_metadata};
use crate::platform::{PlatformTarget, ProfileMap};
use crate::scene::AssetStore;
use crate::staging::{RelocationError, StagingManager, StagingPolicy};
use crate::util::fs::remove_dir_if_exists;
use crate::validate::{self, Validated, ValidationError};

/// Picks the directory a finished package is written to.
///
/// `None` means the operator cancelled; the run then fails and the staging
/// root is left on disk.
pub trait DestinationPrompt: Send + Sync {
  fn choose(&self, descriptor: &ContentDescriptor) -> Option<PathBuf>;
}

impl DestinationPrompt for Option<PathBuf> {
  fn choose(&self, _descriptor: &ContentDescriptor) -> Option<PathBuf> {
    self.clone()
  }
}

impl DestinationPrompt for PathBuf {
  fn choose(&self, _descriptor: &ContentDescriptor) -> Option<PathBuf> {
    Some(self.clone())
  }
}

/// Platform the editor itself runs on; local test builds target it.
const LOCAL_TEST_PLATFORM: PlatformTarget = PlatformTarget::Win;

/// Where one platform's bundler output goes and which catalog marks it complete.
struct BundleOutput<'a> {
  root: &'a Path,
  player_version: Option<&'a str>,
  catalog_file: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
  Idle,
  Validating,
  Preparing,
  SwitchingEnv(PlatformTarget),
  ValidatingPlatform(PlatformTarget),
  Bundling(PlatformTarget),
  Relocating(PlatformTarget),
  WritingMetadata,
  Archiving,
  Succeeded,
  Failed,
}

/// State of one invocation. Lives outside the run future so it survives a panic.
struct BuildRun {
  staging: StagingManager,
  state: RunState,
  attempted: Vec<PlatformTarget>,
  built: Vec<PlatformTarget>,
  staging_created: bool,
}

impl BuildRun {
  fn new(root: PathBuf) -> Self {
    Self {
      staging: StagingManager::new(root),
      state: RunState::Idle,
      attempted: Vec::new(),
      built: Vec::new(),
      staging_created: false,
    }
  }

  fn enter(&mut self, state: RunState) {
    debug!(from = ?self.state, to = ?state, "build state");
    self.state = state;
  }

  fn staging_on_disk(&self) -> bool {
    self.staging_created && self.staging.root().exists()
  }
}

/// Drives validation, per-platform bundling, stamping and archiving.
///
/// Only one pipeline may run against a given environment at a time: the
/// active profile slot is not locked.
pub struct Pipeline<E: BuildEnvironment, B: Bundler> {
  env: E,
  bundler: B,
  assets: Arc<dyn AssetStore>,
  profiles: ProfileMap,
  identity: Box<dyn IdentityProvider>,
  observer: Arc<dyn BuildObserver>,
  destination: Box<dyn DestinationPrompt>,
  options: BuildOptions,
}

impl<E: BuildEnvironment, B: Bundler> Pipeline<E, B> {
  pub fn new(env: E, bundler: B, assets: Arc<dyn AssetStore>, profiles: ProfileMap, options: BuildOptions) -> Self {
    Self {
      env,
      bundler,
      assets,
      profiles,
      identity: Box::new(EnvIdentity),
      observer: Arc::new(NoopObserver),
      destination: Box::new(None::<PathBuf>),
      options,
    }
  }

  pub fn with_identity(mut self, identity: impl IdentityProvider + 'static) -> Self {
    self.identity = Box::new(identity);
    self
  }

  pub fn with_observer(mut self, observer: Arc<dyn BuildObserver>) -> Self {
    self.observer = observer;
    self
  }

  pub fn with_destination(mut self, destination: impl DestinationPrompt + 'static) -> Self {
    self.destination = Box::new(destination);
    self
  }

  pub fn env(&self) -> &E {
    &self.env
  }

  pub fn bundler(&self) -> &B {
    &self.bundler
  }

  pub fn options(&self) -> &BuildOptions {
    &self.options
  }

  /// Validate `descriptor` and persist any corrections made to its assets.
  pub fn validate_content(&self, descriptor: &ContentDescriptor) -> Result<Validated, BuildError> {
    let validated = validate::validate(descriptor, self.assets.as_ref())?;
    self.persist_corrections(&validated)?;
    Ok(validated)
  }

  /// Run the full pipeline for every enabled platform.
  pub async fn build(&self, descriptor: &ContentDescriptor) -> BuildResult {
    let started = Instant::now();
    info!(name = %descriptor.display_name, kind = %descriptor.kind, "build started");

    let mut run = BuildRun::new(self.options.staging_root(descriptor));
    let outcome = catch_panics(self.run_build(descriptor, &mut run)).await;

    match outcome {
      Ok(path) => {
        run.enter(RunState::Succeeded);
        info!(path = ?path, platforms = ?run.built, elapsed = ?started.elapsed(), "build succeeded");
        BuildResult::success(
          &descriptor.display_name,
          format!("built {} platform(s)", run.built.len()),
          started.elapsed(),
          path.display().to_string(),
        )
      }
      Err(e) => {
        error!(error = %e, kind = ?e.kind(), state = ?run.state, attempted = ?run.attempted, "build failed");
        run.enter(RunState::Failed);
        let output = self.dispose_staging(&run, &e).await;
        BuildResult::fail(&descriptor.display_name, e.to_string(), started.elapsed(), output)
      }
    }
  }

  /// Build a single platform into the persistent manual folder without archiving.
  pub async fn build_platform(&self, descriptor: &ContentDescriptor, platform: PlatformTarget) -> BuildResult {
    let started = Instant::now();
    info!(name = %descriptor.display_name, platform = %platform, "manual platform build started");

    let mut run = BuildRun::new(self.options.manual_root(descriptor));
    let outcome = catch_panics(self.run_manual_platform(descriptor, platform, &mut run)).await;

    match outcome {
      Ok(dest) => BuildResult::success(
        &descriptor.display_name,
        format!("built {} into manual folder", platform.display_name()),
        started.elapsed(),
        dest.display().to_string(),
      ),
      Err(e) => {
        error!(error = %e, kind = ?e.kind(), state = ?run.state, "manual platform build failed");
        BuildResult::fail(&descriptor.display_name, e.to_string(), started.elapsed(), String::new())
      }
    }
  }

  /// Stamp and archive whatever platforms the manual folder holds.
  pub async fn package_manual(&self, descriptor: &ContentDescriptor) -> BuildResult {
    let started = Instant::now();
    info!(name = %descriptor.display_name, "packaging manual folder");

    let mut run = BuildRun::new(self.options.manual_root(descriptor));
    let outcome = catch_panics(self.run_package_manual(descriptor, &mut run)).await;

    match outcome {
      Ok(path) => BuildResult::success(
        &descriptor.display_name,
        format!("packaged {} platform(s)", run.built.len()),
        started.elapsed(),
        path.display().to_string(),
      ),
      Err(e) => {
        error!(error = %e, kind = ?e.kind(), state = ?run.state, "packaging failed");
        let output = if run.staging.root().exists() {
          run.staging.root().display().to_string()
        } else {
          String::new()
        };
        BuildResult::fail(&descriptor.display_name, e.to_string(), started.elapsed(), output)
      }
    }
  }

  /// Build a world for the editor platform into the local test directory.
  ///
  /// The directory is wiped first. On success a reload trigger holding the
  /// build time is written next to the output so a running client picks the
  /// new build up. Nothing is staged or archived.
  pub async fn build_local_test(&self, descriptor: &ContentDescriptor) -> BuildResult {
    let started = Instant::now();
    info!(name = %descriptor.display_name, dir = ?self.options.local_test_dir, "local test build started");

    let mut run = BuildRun::new(self.options.local_test_dir.clone());
    let outcome = catch_panics(self.run_local_test(descriptor, &mut run)).await;

    match outcome {
      Ok(_) => BuildResult::success(
        &descriptor.display_name,
        "local test build ready",
        started.elapsed(),
        run.staging.root().display().to_string(),
      ),
      Err(e) => {
        error!(error = %e, kind = ?e.kind(), state = ?run.state, "local test build failed");
        BuildResult::fail(&descriptor.display_name, e.to_string(), started.elapsed(), String::new())
      }
    }
  }

  async fn run_build(&self, descriptor: &ContentDescriptor, run: &mut BuildRun) -> Result<PathBuf, BuildError> {
    run.enter(RunState::Validating);
    let validated = self.validate_content(descriptor)?;
    let manifest = Manifest::new(validated.properties)?;
    self.env.check_prerequisites().await?;

    let mut checkout = ProfileCheckout::acquire(&self.env).await?;
    let outcome = self.build_and_package(descriptor, &manifest, &mut checkout, run).await;
    let restored = checkout.release().await;

    if let (Err(_), Err(e)) = (&outcome, &restored) {
      error!(error = %e, "failed to restore build profile");
    }
    let path = outcome?;
    restored?;
    Ok(path)
  }

  async fn build_and_package(
    &self,
    descriptor: &ContentDescriptor,
    manifest: &Manifest,
    checkout: &mut ProfileCheckout<'_, E>,
    run: &mut BuildRun,
  ) -> Result<PathBuf, BuildError> {
    run.enter(RunState::Preparing);
    run.staging.prepare().await?;
    run.staging_created = true;
    let bundle_root = self.options.bundle_root(descriptor);
    clear_bundle_root(&bundle_root).await?;

    let platforms = descriptor.enabled_platforms();
    if platforms.is_empty() {
      return Err(ValidationError::NoPlatformSelected.into());
    }

    for platform in platforms {
      self.build_one(descriptor, platform, &bundle_root, checkout, run).await?;
    }

    run.enter(RunState::WritingMetadata);
    self.stamp(descriptor, manifest, run)?;

    run.enter(RunState::Archiving);
    let destination = self.destination.choose(descriptor);
    let path = archive::archive(
      run.staging.root(),
      descriptor.kind.extension(),
      destination.as_deref(),
      &descriptor.display_name,
    )?;

    if let Err(e) = remove_dir_if_exists(&bundle_root).await {
      warn!(path = ?bundle_root, error = %e, "failed to clean bundler output");
    }
    Ok(path)
  }

  /// Switch, re-validate, bundle and relocate one platform.
  async fn build_one(
    &self,
    descriptor: &ContentDescriptor,
    platform: PlatformTarget,
    bundle_root: &Path,
    checkout: &mut ProfileCheckout<'_, E>,
    run: &mut BuildRun,
  ) -> Result<PathBuf, BuildError> {
    let output = BundleOutput {
      root: bundle_root,
      player_version: None,
      catalog_file: &self.options.catalog_file,
    };
    let raw = self.bundle_platform(descriptor, platform, &output, checkout, run).await?;

    run.enter(RunState::Relocating(platform));
    let dest = run.staging.relocate(&raw, platform).await?;
    run.built.push(platform);
    Ok(dest)
  }

  /// Switch, re-validate and bundle one platform; returns the raw output directory.
  async fn bundle_platform(
    &self,
    descriptor: &ContentDescriptor,
    platform: PlatformTarget,
    output: &BundleOutput<'_>,
    checkout: &mut ProfileCheckout<'_, E>,
    run: &mut BuildRun,
  ) -> Result<PathBuf, BuildError> {
    run.attempted.push(platform);

    run.enter(RunState::SwitchingEnv(platform));
    let profile = self
      .profiles
      .resolve(platform, self.options.host)
      .ok_or(EnvironmentError::MissingProfile { platform })?;
    checkout.switch(platform, profile).await?;
    self.observer.platform_changed(platform);

    run.enter(RunState::ValidatingPlatform(platform));
    let validated = validate::validate_platform(descriptor, platform, self.assets.as_ref())?;
    self.persist_corrections(&validated)?;
    if !self.observer.build_condition(descriptor.kind, platform) {
      return Err(ValidationError::BuildConditionNotMet { platform }.into());
    }

    run.enter(RunState::Bundling(platform));
    run.staging.clear_platform(platform).await?;
    let request = BundleRequest {
      group: descriptor.kind.group_name().to_string(),
      address: descriptor.kind.extension().to_string(),
      source: descriptor
        .target(platform)
        .map(|t| t.source_path.trim().to_string())
        .unwrap_or_default(),
      entries: extra_entries(descriptor),
      platform,
      profile: profile.clone(),
      player_version: output.player_version.map(str::to_string),
      output_root: output.root.to_path_buf(),
    };
    self.observer.bundle_started(&request);
    let raw = self.bundler.bundle(&request).await?;
    verify_catalog(&raw, output.catalog_file)?;
    self.observer.bundle_finished(platform, &raw);
    Ok(raw)
  }

  async fn run_manual_platform(
    &self,
    descriptor: &ContentDescriptor,
    platform: PlatformTarget,
    run: &mut BuildRun,
  ) -> Result<PathBuf, BuildError> {
    run.enter(RunState::Validating);
    let validated = validate::validate_platform(descriptor, platform, self.assets.as_ref())?;
    self.persist_corrections(&validated)?;
    self.env.check_prerequisites().await?;

    run.enter(RunState::Preparing);
    run.staging.ensure().await?;
    run.staging_created = true;
    let bundle_root = self.options.bundle_root(descriptor);
    clear_bundle_root(&bundle_root).await?;

    let mut checkout = ProfileCheckout::acquire(&self.env).await?;
    let outcome = self.build_one(descriptor, platform, &bundle_root, &mut checkout, run).await;
    let restored = checkout.release().await;

    if let (Err(_), Err(e)) = (&outcome, &restored) {
      error!(error = %e, "failed to restore build profile");
    }
    let dest = outcome?;
    restored?;
    info!(platform = %platform, path = ?dest, "manual platform build finished");
    Ok(dest)
  }

  async fn run_package_manual(&self, descriptor: &ContentDescriptor, run: &mut BuildRun) -> Result<PathBuf, BuildError> {
    run.enter(RunState::Validating);
    let root = run.staging.root().to_path_buf();
    if !root.is_dir() {
      return Err(BuildError::NothingToPackage { path: root });
    }

    run.staging.retain_platform_dirs().await?;
    run.built = run.staging.present_platforms();
    if run.built.is_empty() {
      return Err(BuildError::NothingToPackage { path: root });
    }

    let validated = self.validate_content(descriptor)?;
    let manifest = Manifest::new(validated.properties)?;

    run.enter(RunState::WritingMetadata);
    self.stamp(descriptor, &manifest, run)?;

    run.enter(RunState::Archiving);
    let destination = self.destination.choose(descriptor);
    let path = archive::archive(
      &root,
      descriptor.kind.extension(),
      destination.as_deref(),
      &descriptor.display_name,
    )?;
    Ok(path)
  }

  async fn run_local_test(&self, descriptor: &ContentDescriptor, run: &mut BuildRun) -> Result<PathBuf, BuildError> {
    run.enter(RunState::Preparing);
    run.staging.prepare().await?;
    run.staging_created = true;

    run.enter(RunState::Validating);
    if descriptor.kind != ContentKind::World {
      return Err(BuildError::LocalTestUnsupported { kind: descriptor.kind });
    }
    let validated = validate::validate_platform(descriptor, LOCAL_TEST_PLATFORM, self.assets.as_ref())?;
    self.persist_corrections(&validated)?;
    self.env.check_prerequisites().await?;

    let root = run.staging.root().to_path_buf();
    let catalog_file = versioned_catalog_file(LOCAL_TEST_PLAYER_VERSION);
    let output = BundleOutput {
      root: &root,
      player_version: Some(LOCAL_TEST_PLAYER_VERSION),
      catalog_file: &catalog_file,
    };

    let mut checkout = ProfileCheckout::acquire(&self.env).await?;
    let outcome = self.bundle_platform(descriptor, LOCAL_TEST_PLATFORM, &output, &mut checkout, run).await;
    let restored = checkout.release().await;

    if let (Err(_), Err(e)) = (&outcome, &restored) {
      error!(error = %e, "failed to restore build profile");
    }
    let raw = outcome?;
    restored?;
    run.built.push(LOCAL_TEST_PLATFORM);

    let trigger = root.join(RELOAD_TRIGGER_FILE);
    fs::write(&trigger, Local::now().to_rfc3339())
      .await
      .map_err(|source| BuildError::ReloadTrigger {
        path: trigger.clone(),
        source,
      })?;
    info!(path = ?raw, trigger = ?trigger, "local test build ready");
    Ok(raw)
  }

  fn persist_corrections(&self, validated: &Validated) -> Result<(), BuildError> {
    for (path, graph) in validated.corrected_graphs() {
      self.assets.save(path, graph)?;
      debug!(path, "saved corrected asset");
    }
    for correction in &validated.corrections {
      info!(correction = %correction, "applied correction");
    }
    Ok(())
  }

  fn stamp(&self, descriptor: &ContentDescriptor, manifest: &Manifest, run: &BuildRun) -> Result<(), BuildError> {
    let root = run.staging.root();
    write_manifest(root, manifest.properties())?;
    let creator = resolve_identity(self.identity.as_ref());
    write_metadata(root, &Metadata::new(descriptor, creator, &run.built, Local::now()))?;
    Ok(())
  }

  /// Apply the staging policy after a failed run; returns the path left for inspection.
  ///
  /// A cancelled destination always keeps the staging root: it already holds
  /// a complete, stamped package tree.
  async fn dispose_staging(&self, run: &BuildRun, error: &BuildError) -> String {
    if !run.staging_on_disk() {
      return String::new();
    }
    let root = run.staging.root();
    let cancelled = matches!(error, BuildError::Archive(ArchiveError::NoDestination));

    match self.options.staging_policy {
      _ if cancelled => {
        warn!(path = ?root, "no destination selected; staging directory left in place");
        root.display().to_string()
      }
      StagingPolicy::KeepOnFailure => {
        warn!(path = ?root, "keeping staging directory for inspection");
        root.display().to_string()
      }
      StagingPolicy::PurgeOnFailure => match run.staging.purge().await {
        Ok(()) => String::new(),
        Err(e) => {
          warn!(path = ?root, error = %e, "failed to purge staging directory");
          root.display().to_string()
        }
      },
    }
  }
}

fn extra_entries(descriptor: &ContentDescriptor) -> Vec<AssetEntry> {
  match descriptor.kind {
    ContentKind::World => descriptor
      .map_objects
      .iter()
      .map(|o| AssetEntry {
        address: o.key.clone(),
        source: o.prefab.clone(),
      })
      .collect(),
    ContentKind::PortableObject | ContentKind::Avatar => Vec::new(),
  }
}

async fn clear_bundle_root(path: &Path) -> Result<(), BuildError> {
  remove_dir_if_exists(path).await.map_err(|source| RelocationError::Remove {
    path: path.to_path_buf(),
    source,
  })?;
  Ok(())
}

/// Turn a panic inside `future` into a [`BuildError::Panicked`].
async fn catch_panics<T>(future: impl Future<Output = Result<T, BuildError>>) -> Result<T, BuildError> {
  match AssertUnwindSafe(future).catch_unwind().await {
    Ok(result) => result,
    Err(panic) => Err(BuildError::Panicked(panic_message(panic.as_ref()))),
  }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
  if let Some(s) = panic.downcast_ref::<&str>() {
    s.to_string()
  } else if let Some(s) = panic.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}
