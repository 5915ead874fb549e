use std::path::PathBuf;

use crate::consts::{APP_NAME, LOCAL_TEST_DIR_ENV, LOCAL_TEST_DIR_NAME, WORK_DIR_ENV};

/// Returns the user's home directory, if it can be determined.
#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("USERPROFILE").map(PathBuf::from)
}

/// Returns the user's home directory, if it can be determined.
#[cfg(not(windows))]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("HOME").map(PathBuf::from)
}

/// Returns the directory for cache files for the application
#[cfg(windows)]
pub fn cache_dir() -> PathBuf {
  std::env::var_os("LOCALAPPDATA")
    .map(PathBuf::from)
    .unwrap_or_else(std::env::temp_dir)
    .join(APP_NAME)
    .join("Cache")
}

/// Returns the directory for cache files for the application
#[cfg(not(windows))]
pub fn cache_dir() -> PathBuf {
  let cache_home = std::env::var_os("XDG_CACHE_HOME")
    .map(PathBuf::from)
    .or_else(|| home_dir().map(|h| h.join(".cache")))
    .unwrap_or_else(std::env::temp_dir);
  cache_home.join(APP_NAME)
}

/// Root for staging, bundler output and manual builds.
///
/// `VPACK_WORK_DIR` overrides the cache location.
pub fn work_dir() -> PathBuf {
  std::env::var_os(WORK_DIR_ENV)
    .map(PathBuf::from)
    .unwrap_or_else(cache_dir)
}

/// Fixed directory a running client loads local test builds from.
pub fn local_test_dir() -> PathBuf {
  std::env::var_os(LOCAL_TEST_DIR_ENV)
    .map(PathBuf::from)
    .unwrap_or_else(|| std::env::temp_dir().join(LOCAL_TEST_DIR_NAME))
}
