use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{load_project, pipeline, report, runtime};
use crate::output::OutputFormat;

/// Stamp and archive the platforms built with `vpack build-platform`.
pub fn cmd_package(project_path: &Path, out: Option<PathBuf>, output: OutputFormat) -> Result<()> {
  let project = load_project(project_path)?;
  let destination = out.or_else(|| project.config.destination.clone());
  let pipeline = pipeline(&project, project.build_options(), destination);

  let rt = runtime()?;
  let result = rt.block_on(pipeline.package_manual(&project.config.content));
  report(&result, output)
}
