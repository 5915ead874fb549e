use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use super::{BuildEnvironment, EnvironmentError};
use crate::platform::BuildProfile;

#[derive(Debug, Default)]
struct State {
  active: Option<BuildProfile>,
  activations: Vec<Option<BuildProfile>>,
  restore_now_calls: usize,
  missing: Vec<String>,
  failing: Option<BuildProfile>,
}

/// In-process build environment.
///
/// Activation settles asynchronously: a background task bumps a refresh
/// generation on a watch channel and `activate` waits for it, the same
/// shape as waiting on an editor's recompilation callback.
#[derive(Debug, Clone)]
pub struct MemoryEnvironment {
  state: Arc<Mutex<State>>,
  refresh: Arc<watch::Sender<u64>>,
}

impl Default for MemoryEnvironment {
  fn default() -> Self {
    Self::new()
  }
}

impl MemoryEnvironment {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(0);
    Self {
      state: Arc::new(Mutex::new(State::default())),
      refresh: Arc::new(tx),
    }
  }

  pub fn with_profile(profile: impl Into<String>) -> Self {
    let env = Self::new();
    env.lock().active = Some(BuildProfile::new(profile));
    env
  }

  /// Report `package` as missing from `check_prerequisites`.
  pub fn missing_prerequisite(self, package: impl Into<String>) -> Self {
    self.lock().missing.push(package.into());
    self
  }

  /// Fail activation of `profile` after it has been written to the slot.
  pub fn failing_on(self, profile: impl Into<String>) -> Self {
    self.lock().failing = Some(BuildProfile::new(profile));
    self
  }

  pub fn active(&self) -> Option<BuildProfile> {
    self.lock().active.clone()
  }

  /// Every profile passed to `activate`, in order.
  pub fn activations(&self) -> Vec<Option<BuildProfile>> {
    self.lock().activations.clone()
  }

  pub fn restore_now_calls(&self) -> usize {
    self.lock().restore_now_calls
  }

  /// Current refresh generation; bumps once per settled activation.
  pub fn generation(&self) -> u64 {
    *self.refresh.borrow()
  }

  fn lock(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl BuildEnvironment for MemoryEnvironment {
  async fn current_profile(&self) -> Result<Option<BuildProfile>, EnvironmentError> {
    Ok(self.active())
  }

  async fn activate(&self, profile: Option<&BuildProfile>) -> Result<(), EnvironmentError> {
    let fails = {
      let mut state = self.lock();
      state.active = profile.cloned();
      state.activations.push(profile.cloned());
      profile.is_some() && state.failing.as_ref() == profile
    };

    let mut settled = self.refresh.subscribe();
    let refresh = Arc::clone(&self.refresh);
    tokio::spawn(async move {
      tokio::task::yield_now().await;
      refresh.send_modify(|generation| *generation += 1);
    });
    settled.changed().await.map_err(|e| EnvironmentError::Activation {
      profile: format!("{profile:?}"),
      message: e.to_string(),
    })?;
    debug!(profile = ?profile, generation = *settled.borrow(), "environment settled");

    match (fails, profile) {
      (true, Some(profile)) => Err(EnvironmentError::Activation {
        profile: profile.to_string(),
        message: "activation rejected".to_string(),
      }),
      _ => Ok(()),
    }
  }

  async fn check_prerequisites(&self) -> Result<(), EnvironmentError> {
    match self.lock().missing.first() {
      Some(package) => Err(EnvironmentError::MissingPrerequisite {
        package: package.clone(),
      }),
      None => Ok(()),
    }
  }

  fn restore_now(&self, profile: Option<&BuildProfile>) -> Result<(), EnvironmentError> {
    let mut state = self.lock();
    state.active = profile.cloned();
    state.restore_now_calls += 1;
    Ok(())
  }
}
