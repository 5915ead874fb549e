use std::path::Path;

use crate::bundle::BundleRequest;
use crate::content::ContentKind;
use crate::platform::PlatformTarget;

/// Hooks around each platform build. Every method has a no-op default.
pub trait BuildObserver: Send + Sync {
  /// The environment has settled on `platform`'s profile.
  fn platform_changed(&self, _platform: PlatformTarget) {}

  /// Return false to fail the platform before bundling.
  fn build_condition(&self, _kind: ContentKind, _platform: PlatformTarget) -> bool {
    true
  }

  fn bundle_started(&self, _request: &BundleRequest) {}

  fn bundle_finished(&self, _platform: PlatformTarget, _output: &Path) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl BuildObserver for NoopObserver {}
