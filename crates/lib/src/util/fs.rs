//! Filesystem helpers shared by staging, archiving, and the environment switch.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

/// Remove a directory tree if it exists.
///
/// Returns `true` when something was removed.
pub async fn remove_dir_if_exists(path: &Path) -> io::Result<bool> {
  match fs::remove_dir_all(path).await {
    Ok(()) => Ok(true),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
    Err(e) => Err(e),
  }
}

/// Returns true if `path` is a directory with at least one entry.
pub fn is_populated_dir(path: &Path) -> bool {
  std::fs::read_dir(path)
    .map(|mut entries| entries.next().is_some())
    .unwrap_or(false)
}

/// Move a directory, falling back to copy + delete when the rename crosses devices.
pub async fn move_dir(from: &Path, to: &Path) -> io::Result<()> {
  match fs::rename(from, to).await {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
      debug!(from = ?from, to = ?to, "rename crosses devices, copying instead");
      let (src, dst) = (from.to_path_buf(), to.to_path_buf());
      tokio::task::spawn_blocking(move || copy_tree(&src, &dst))
        .await
        .map_err(io::Error::other)??;
      fs::remove_dir_all(from).await
    }
    Err(e) => Err(e),
  }
}

/// Recursively copy `from` into a new directory `to`.
pub fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
  for entry in WalkDir::new(from).sort_by_file_name() {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(from).map_err(io::Error::other)?;
    let target = to.join(rel);

    if entry.file_type().is_dir() {
      std::fs::create_dir_all(&target)?;
    } else {
      if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
      }
      std::fs::copy(entry.path(), &target)?;
    }
  }
  Ok(())
}

/// Move a file, copying it when the rename crosses devices.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
  match std::fs::rename(from, to) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
      debug!(from = ?from, to = ?to, "rename crosses devices, copying instead");
      std::fs::copy(from, to)?;
      std::fs::remove_file(from)
    }
    Err(e) => Err(e),
  }
}

/// Write `content` via a temporary sibling file and rename it into place.
pub fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  let temp_path = sibling_with_suffix(path, "tmp");
  std::fs::write(&temp_path, content)?;
  std::fs::rename(&temp_path, path)
}

/// `dir/name` -> `dir/name.<suffix>`
pub fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
  let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  name.push(".");
  name.push(suffix);
  path.with_file_name(name)
}

/// Make a content name safe to use as a single path component.
pub fn sanitize_component(name: &str) -> String {
  let cleaned: String = name
    .trim()
    .chars()
    .map(|c| match c {
      '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
      c if c.is_control() => '_',
      c => c,
    })
    .collect();

  match cleaned.as_str() {
    "" | "." | ".." => "_".to_string(),
    _ => cleaned,
  }
}
