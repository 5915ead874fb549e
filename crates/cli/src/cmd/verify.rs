//! Implementation of the `vpack verify` command.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use vpack_lib::archive::{inspect, read_entry};
use vpack_lib::manifest::{MANIFEST_FILE, MANIFEST_HASH_FILE, METADATA_FILE, METADATA_HASH_FILE, check_hash};
use vpack_lib::platform::PlatformTarget;

use crate::output::{OutputFormat, print_error, print_info, print_json, print_stat, print_success, symbols};

#[derive(Debug, Serialize)]
struct HashCheck {
  file: String,
  ok: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

#[derive(Debug, Serialize)]
struct VerifyOutput {
  archive: String,
  platforms: Vec<PlatformTarget>,
  entries: Vec<String>,
  hashes: Vec<HashCheck>,
}

impl VerifyOutput {
  fn ok(&self) -> bool {
    self.hashes.iter().all(|h| h.ok)
  }
}

fn check_entry(archive: &Path, file: &str, hash_file: &str) -> HashCheck {
  let result = read_entry(archive, file)
    .and_then(|content| Ok((content, read_entry(archive, hash_file)?)))
    .map_err(|e| e.to_string())
    .and_then(|(content, recorded)| {
      check_hash(file, &content, &String::from_utf8_lossy(&recorded)).map_err(|e| e.to_string())
    });

  HashCheck {
    file: file.to_string(),
    ok: result.is_ok(),
    error: result.err(),
  }
}

/// List a package's entries and recheck its manifest and metadata hashes.
pub fn cmd_verify(archive: &Path, output: OutputFormat) -> Result<()> {
  let entries = inspect(archive).with_context(|| format!("Failed to open package: {}", archive.display()))?;
  let platforms = PlatformTarget::ALL
    .into_iter()
    .filter(|p| entries.iter().any(|e| e == &format!("{}/", p.dir_name())))
    .collect();
  let hashes = [(MANIFEST_FILE, MANIFEST_HASH_FILE), (METADATA_FILE, METADATA_HASH_FILE)]
    .into_iter()
    .map(|(file, hash_file)| check_entry(archive, file, hash_file))
    .collect();

  let report = VerifyOutput {
    archive: archive.display().to_string(),
    platforms,
    entries,
    hashes,
  };

  if output.is_json() {
    print_json(&report)?;
  } else {
    print_info(&format!("{} ({} entries)", report.archive, report.entries.len()));
    let platforms: Vec<&str> = report.platforms.iter().map(|p| p.display_name()).collect();
    print_stat("Platforms", &platforms.join(", "));
    for check in &report.hashes {
      match &check.error {
        None => print_success(&format!("{} {} hash ok", check.file, symbols::ARROW)),
        Some(e) => print_error(&format!("{} {} {}", check.file, symbols::ARROW, e)),
      }
    }
  }

  if !report.ok() {
    std::process::exit(1);
  }
  Ok(())
}
