use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{load_project, pipeline, report, runtime};
use crate::output::OutputFormat;

/// Build the world for the editor platform into the local test directory.
pub fn cmd_test_local(project_path: &Path, dir: Option<PathBuf>, output: OutputFormat) -> Result<()> {
  let project = load_project(project_path)?;
  let mut options = project.build_options();
  if let Some(dir) = dir {
    options = options.with_local_test_dir(dir);
  }
  let pipeline = pipeline(&project, options, None);

  let rt = runtime()?;
  let result = rt.block_on(pipeline.build_local_test(&project.config.content));
  report(&result, output)
}
