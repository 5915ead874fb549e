//! Implementation of the `vpack build` command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;
use vpack_lib::staging::StagingPolicy;

use super::{load_project, pipeline, report, runtime};
use crate::output::OutputFormat;

/// Run the full pipeline for every enabled platform.
///
/// The package goes to `--out`, else the project's destination, else a
/// directory asked for on the terminal.
pub fn cmd_build(project_path: &Path, out: Option<PathBuf>, purge_on_failure: bool, output: OutputFormat) -> Result<()> {
  let project = load_project(project_path)?;

  let mut options = project.build_options();
  if purge_on_failure {
    options = options.with_staging_policy(StagingPolicy::PurgeOnFailure);
  }
  info!(work_dir = ?options.work_dir, "building");

  let destination = out.or_else(|| project.config.destination.clone());
  let pipeline = pipeline(&project, options, destination);

  let rt = runtime()?;
  let result = rt.block_on(pipeline.build(&project.config.content));
  report(&result, output)
}
