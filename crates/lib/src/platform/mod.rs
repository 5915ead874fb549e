pub mod paths;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A target platform a content package can be built for.
///
/// The declaration order is the build order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformTarget {
  Win,
  Mac,
  Aos,
  Ios,
  Web,
}

impl PlatformTarget {
  /// All platforms in build order.
  pub const ALL: [PlatformTarget; 5] = [Self::Win, Self::Mac, Self::Aos, Self::Ios, Self::Web];

  /// Canonical lowercase directory name inside a package.
  pub fn dir_name(&self) -> &'static str {
    match self {
      Self::Win => "win",
      Self::Mac => "mac",
      Self::Aos => "aos",
      Self::Ios => "ios",
      Self::Web => "web",
    }
  }

  /// Upper-case name recorded in build metadata.
  pub fn display_name(&self) -> &'static str {
    match self {
      Self::Win => "WIN",
      Self::Mac => "MAC",
      Self::Aos => "AOS",
      Self::Ios => "IOS",
      Self::Web => "WEB",
    }
  }

  /// Native build-target name the bundler uses for its raw output folder.
  pub fn bundler_target(&self) -> &'static str {
    match self {
      Self::Win => "StandaloneWindows64",
      Self::Mac => "StandaloneOSX",
      Self::Aos => "Android",
      Self::Ios => "iOS",
      Self::Web => "WebGL",
    }
  }
}

impl fmt::Display for PlatformTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.dir_name())
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for PlatformTarget {
  type Err = UnknownPlatform;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|p| p.dir_name().eq_ignore_ascii_case(s) || p.bundler_target().eq_ignore_ascii_case(s))
      .ok_or_else(|| UnknownPlatform(s.to_string()))
  }
}

/// Name of an external build-environment profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildProfile(pub String);

impl BuildProfile {
  pub fn new(name: impl Into<String>) -> Self {
    Self(name.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for BuildProfile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Host operating system, as far as profile selection cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Host {
  MacOs,
  Other,
}

impl Host {
  pub fn current() -> Self {
    if cfg!(target_os = "macos") { Self::MacOs } else { Self::Other }
  }
}

/// Platform to build-profile mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileMap(BTreeMap<PlatformTarget, BuildProfile>);

impl ProfileMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, platform: PlatformTarget, profile: impl Into<String>) -> Self {
    self.insert(platform, BuildProfile::new(profile));
    self
  }

  pub fn insert(&mut self, platform: PlatformTarget, profile: BuildProfile) {
    self.0.insert(platform, profile);
  }

  pub fn get(&self, platform: PlatformTarget) -> Option<&BuildProfile> {
    self.0.get(&platform)
  }

  /// Profile to activate for `platform` on `host`.
  ///
  /// The desktop macOS profile cannot be activated off-host, so a non-macOS
  /// host builds the Mac platform with the iOS profile.
  pub fn resolve(&self, platform: PlatformTarget, host: Host) -> Option<&BuildProfile> {
    match (platform, host) {
      (PlatformTarget::Mac, Host::Other) => self.get(PlatformTarget::Ios),
      _ => self.get(platform),
    }
  }
}
