//! Who is building: stamped into package metadata.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::consts::{NICKNAME_ENV, USER_ID_ENV};

pub const UNKNOWN_USER: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
  pub user_id: String,
  pub nickname: String,
}

impl UserIdentity {
  pub fn new(user_id: impl Into<String>, nickname: impl Into<String>) -> Self {
    Self {
      user_id: user_id.into(),
      nickname: nickname.into(),
    }
  }

  pub fn unknown() -> Self {
    Self::new(UNKNOWN_USER, UNKNOWN_USER)
  }
}

#[derive(Debug, Error)]
#[error("identity unavailable: {0}")]
pub struct IdentityError(pub String);

pub trait IdentityProvider: Send + Sync {
  fn identity(&self) -> Result<UserIdentity, IdentityError>;
}

/// Identity from `VPACK_USER_ID` / `VPACK_NICKNAME`, falling back to the OS user.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvIdentity;

impl IdentityProvider for EnvIdentity {
  fn identity(&self) -> Result<UserIdentity, IdentityError> {
    let env = |key| std::env::var(key).ok().filter(|v: &String| !v.trim().is_empty());

    let user_id = match env(USER_ID_ENV) {
      Some(id) => id,
      None => whoami::fallible::username().map_err(|e| IdentityError(e.to_string()))?,
    };
    let nickname = env(NICKNAME_ENV)
      .or_else(|| whoami::fallible::realname().ok().filter(|n| !n.trim().is_empty()))
      .unwrap_or_else(|| user_id.clone());

    Ok(UserIdentity::new(user_id, nickname))
  }
}

/// A fixed identity.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub UserIdentity);

impl IdentityProvider for StaticIdentity {
  fn identity(&self) -> Result<UserIdentity, IdentityError> {
    Ok(self.0.clone())
  }
}

/// Ask `provider` for the identity; a failure means "unknown", never an error.
pub fn resolve_identity(provider: &dyn IdentityProvider) -> UserIdentity {
  provider.identity().unwrap_or_else(|e| {
    warn!(error = %e, "using unknown identity");
    UserIdentity::unknown()
  })
}
