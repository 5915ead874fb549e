//! Packaging a staging root into a single versioned archive.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::util::fs::{move_file, sanitize_component, sibling_with_suffix};

#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("no destination selected")]
  NoDestination,

  #[error("{path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to walk {path}: {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("zip error in {path}: {source}")]
  Zip {
    path: PathBuf,
    #[source]
    source: zip::result::ZipError,
  },
}

impl ArchiveError {
  fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
    move |source| Self::Io {
      path: path.to_path_buf(),
      source,
    }
  }

  fn zip(path: &Path) -> impl FnOnce(zip::result::ZipError) -> Self + '_ {
    move |source| Self::Zip {
      path: path.to_path_buf(),
      source,
    }
  }
}

/// Final path of the package for `base_name` in `destination`.
pub fn package_path(destination: &Path, base_name: &str, extension: &str) -> PathBuf {
  destination.join(format!("{}.{}", sanitize_component(base_name), extension))
}

/// Zip `staging_root` into `<destination>/<base_name>.<extension>` and delete the root.
///
/// The archive is first written next to the root as `<root>.<extension>` and
/// moved into place once the root is gone, so `destination` may lie inside
/// it. An existing package at the target path is replaced. With no
/// destination the root is left untouched.
pub fn archive(
  staging_root: &Path,
  extension: &str,
  destination: Option<&Path>,
  base_name: &str,
) -> Result<PathBuf, ArchiveError> {
  let destination = destination
    .filter(|d| !d.as_os_str().is_empty())
    .ok_or(ArchiveError::NoDestination)?;

  let scratch = sibling_with_suffix(staging_root, extension);
  if scratch.exists() {
    std::fs::remove_file(&scratch).map_err(ArchiveError::io(&scratch))?;
  }
  let entries = write_zip(staging_root, &scratch)?;
  std::fs::remove_dir_all(staging_root).map_err(ArchiveError::io(staging_root))?;

  std::fs::create_dir_all(destination).map_err(ArchiveError::io(destination))?;
  let target = package_path(destination, base_name, extension);
  if target.exists() {
    debug!(path = ?target, "replacing existing package");
    std::fs::remove_file(&target).map_err(ArchiveError::io(&target))?;
  }
  move_file(&scratch, &target).map_err(ArchiveError::io(&target))?;

  info!(path = ?target, entries, "package written");
  Ok(target)
}

fn write_zip(root: &Path, target: &Path) -> Result<usize, ArchiveError> {
  let file = File::create(target).map_err(ArchiveError::io(target))?;
  let mut zip = ZipWriter::new(BufWriter::new(file));
  let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
  let mut count = 0;

  for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
    let entry = entry.map_err(|source| ArchiveError::Walk {
      path: root.to_path_buf(),
      source,
    })?;
    let name = entry_name(root, entry.path());

    if entry.file_type().is_dir() {
      zip
        .add_directory(format!("{name}/"), options)
        .map_err(ArchiveError::zip(target))?;
    } else {
      zip.start_file(name, options).map_err(ArchiveError::zip(target))?;
      let mut source = File::open(entry.path()).map_err(ArchiveError::io(entry.path()))?;
      io::copy(&mut source, &mut zip).map_err(ArchiveError::io(entry.path()))?;
    }
    count += 1;
  }

  zip.finish().map_err(ArchiveError::zip(target))?;
  Ok(count)
}

/// Forward-slash path of `path` relative to `root`.
fn entry_name(root: &Path, path: &Path) -> String {
  path
    .strip_prefix(root)
    .unwrap_or(path)
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

fn open(path: &Path) -> Result<ZipArchive<BufReader<File>>, ArchiveError> {
  let file = File::open(path).map_err(ArchiveError::io(path))?;
  ZipArchive::new(BufReader::new(file)).map_err(ArchiveError::zip(path))
}

/// List every entry name in a package.
pub fn inspect(path: &Path) -> Result<Vec<String>, ArchiveError> {
  let archive = open(path)?;
  let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
  names.sort();
  Ok(names)
}

/// Read one entry of a package into memory.
pub fn read_entry(path: &Path, name: &str) -> Result<Vec<u8>, ArchiveError> {
  let mut archive = open(path)?;
  let mut entry = archive.by_name(name).map_err(ArchiveError::zip(path))?;
  let mut content = Vec::new();
  entry.read_to_end(&mut content).map_err(ArchiveError::io(path))?;
  Ok(content)
}
