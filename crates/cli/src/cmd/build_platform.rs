use std::path::Path;

use anyhow::Result;
use vpack_lib::platform::PlatformTarget;

use super::{load_project, pipeline, report, runtime};
use crate::output::OutputFormat;

/// Build a single platform into the project's manual folder.
pub fn cmd_build_platform(project_path: &Path, platform: PlatformTarget, output: OutputFormat) -> Result<()> {
  let project = load_project(project_path)?;
  let pipeline = pipeline(&project, project.build_options(), None);

  let rt = runtime()?;
  let result = rt.block_on(pipeline.build_platform(&project.config.content, platform));
  report(&result, output)
}
