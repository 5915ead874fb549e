//! The process-wide build environment and scoped checkout of its active profile.
//!
//! Exactly one build profile is active at a time. Switching it triggers a
//! recompilation the caller has to wait out before bundling. A build run
//! checks the slot out with [`ProfileCheckout`] and must hand back the
//! original profile on every exit path.

mod file;
mod memory;

pub use file::FileEnvironment;
pub use memory::MemoryEnvironment;

use std::future::Future;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::platform::{BuildProfile, PlatformTarget};
use crate::util::cmd::CommandError;

#[derive(Debug, Error)]
pub enum EnvironmentError {
  #[error("no build profile configured for {platform}")]
  MissingProfile { platform: PlatformTarget },

  #[error("required package '{package}' is not installed")]
  MissingPrerequisite { package: String },

  #[error("failed to activate build profile {profile}: {message}")]
  Activation { profile: String, message: String },

  #[error("environment refresh failed: {0}")]
  Refresh(#[from] CommandError),

  #[error("failed to read environment state {path}: {message}")]
  State { path: String, message: String },
}

/// The single active-profile slot of the build environment.
pub trait BuildEnvironment: Send + Sync {
  /// The profile that is active right now, if any.
  fn current_profile(&self) -> impl Future<Output = Result<Option<BuildProfile>, EnvironmentError>> + Send;

  /// Make `profile` active (`None` clears the slot) and wait until the
  /// environment has settled.
  fn activate(&self, profile: Option<&BuildProfile>) -> impl Future<Output = Result<(), EnvironmentError>> + Send;

  /// Fail if a package the build depends on is absent.
  fn check_prerequisites(&self) -> impl Future<Output = Result<(), EnvironmentError>> + Send;

  /// Put `profile` back without waiting for the environment to settle.
  ///
  /// Used from `Drop`, where nothing can be awaited.
  fn restore_now(&self, profile: Option<&BuildProfile>) -> Result<(), EnvironmentError>;
}

/// Scoped checkout of the active profile.
///
/// The snapshot taken on [`acquire`](Self::acquire) is put back by
/// [`release`](Self::release). If the checkout is dropped without being
/// released (an early return or a panic), the snapshot is restored
/// synchronously instead. Nothing is restored when no switch happened.
pub struct ProfileCheckout<'a, E: BuildEnvironment> {
  env: &'a E,
  snapshot: Option<BuildProfile>,
  switched: bool,
  released: bool,
}

impl<'a, E: BuildEnvironment> ProfileCheckout<'a, E> {
  pub async fn acquire(env: &'a E) -> Result<Self, EnvironmentError> {
    let snapshot = env.current_profile().await?;
    debug!(profile = ?snapshot, "checked out build profile");
    Ok(Self {
      env,
      snapshot,
      switched: false,
      released: false,
    })
  }

  pub fn snapshot(&self) -> Option<&BuildProfile> {
    self.snapshot.as_ref()
  }

  /// Activate `profile` for `platform` and wait for the environment to settle.
  pub async fn switch(&mut self, platform: PlatformTarget, profile: &BuildProfile) -> Result<(), EnvironmentError> {
    info!(platform = %platform, profile = %profile, "switching build profile");
    // A failed activation may still have touched the slot.
    self.switched = true;
    self.env.activate(Some(profile)).await
  }

  /// Restore the snapshot and wait for the environment to settle.
  pub async fn release(mut self) -> Result<(), EnvironmentError> {
    self.released = true;
    if !self.switched {
      return Ok(());
    }
    info!(profile = ?self.snapshot, "restoring build profile");
    self.env.activate(self.snapshot.as_ref()).await
  }
}

impl<E: BuildEnvironment> Drop for ProfileCheckout<'_, E> {
  fn drop(&mut self) {
    if self.released || !self.switched {
      return;
    }
    info!(profile = ?self.snapshot, "restoring build profile on unwind");
    if let Err(e) = self.env.restore_now(self.snapshot.as_ref()) {
      error!(error = %e, "failed to restore build profile");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn release_restores_snapshot() {
    let env = MemoryEnvironment::with_profile("editor");
    let mut checkout = ProfileCheckout::acquire(&env).await.unwrap();
    checkout.switch(PlatformTarget::Aos, &BuildProfile::new("android")).await.unwrap();
    assert_eq!(env.active(), Some(BuildProfile::new("android")));

    checkout.release().await.unwrap();
    assert_eq!(env.active(), Some(BuildProfile::new("editor")));
  }

  #[tokio::test]
  async fn drop_without_release_restores_snapshot() {
    let env = MemoryEnvironment::with_profile("editor");
    {
      let mut checkout = ProfileCheckout::acquire(&env).await.unwrap();
      checkout.switch(PlatformTarget::Win, &BuildProfile::new("windows")).await.unwrap();
    }
    assert_eq!(env.active(), Some(BuildProfile::new("editor")));
    assert_eq!(env.restore_now_calls(), 1);
  }

  #[tokio::test]
  async fn untouched_checkout_restores_nothing() {
    let env = MemoryEnvironment::new();
    let checkout = ProfileCheckout::acquire(&env).await.unwrap();
    checkout.release().await.unwrap();
    drop(ProfileCheckout::acquire(&env).await.unwrap());

    assert_eq!(env.active(), None);
    assert!(env.activations().is_empty());
    assert_eq!(env.restore_now_calls(), 0);
  }

  #[tokio::test]
  async fn failed_activation_still_restores() {
    let env = MemoryEnvironment::with_profile("editor").failing_on("broken");
    let mut checkout = ProfileCheckout::acquire(&env).await.unwrap();
    assert!(checkout.switch(PlatformTarget::Web, &BuildProfile::new("broken")).await.is_err());
    checkout.release().await.unwrap();

    assert_eq!(env.active(), Some(BuildProfile::new("editor")));
  }
}
