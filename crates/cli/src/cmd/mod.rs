mod build;
mod build_platform;
mod package;
mod test_local;
mod validate;
mod verify;

pub use build::cmd_build;
pub use build_platform::cmd_build_platform;
pub use package::cmd_package;
pub use test_local::cmd_test_local;
pub use validate::cmd_validate;
pub use verify::cmd_verify;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use vpack_lib::build::{BuildOptions, BuildResult, Pipeline};
use vpack_lib::bundle::CommandBundler;
use vpack_lib::config::Project;
use vpack_lib::env::FileEnvironment;
use vpack_lib::identity::EnvIdentity;
use vpack_lib::scene::FsAssetStore;

use crate::output::{OutputFormat, format_duration, print_error, print_json, print_stat, print_success};
use crate::prompts::TerminalPrompt;

type CliPipeline = Pipeline<FileEnvironment, CommandBundler>;

fn load_project(path: &Path) -> Result<Project> {
  Project::load(path).with_context(|| format!("Failed to load project: {}", path.display()))
}

/// Wire the project's collaborators into a pipeline.
fn pipeline(project: &Project, options: BuildOptions, destination: Option<PathBuf>) -> CliPipeline {
  let config = &project.config;
  let env = FileEnvironment::new(&project.root, project.profile_state_file())
    .with_refresh(config.refresh.clone().unwrap_or_default())
    .with_prerequisites(config.prerequisites.clone());
  let bundler = CommandBundler::new(config.bundler.clone(), &project.root);
  let assets = Arc::new(FsAssetStore::new(&project.root));

  Pipeline::new(env, bundler, assets, config.profiles.clone(), options)
    .with_identity(EnvIdentity)
    .with_destination(TerminalPrompt::new(destination))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}

/// Print a build result; a failed result exits with status 1.
fn report(result: &BuildResult, output: OutputFormat) -> Result<()> {
  if output.is_json() {
    print_json(result)?;
  } else if result.success {
    print_success(&format!("{}: {}", result.target_name, result.message));
    print_stat("Output", &result.output_path);
    print_stat("Duration", &format_duration(Duration::from_secs_f64(result.duration_seconds)));
  } else {
    print_error(&format!("{}: {}", result.target_name, result.message));
    if !result.output_path.is_empty() {
      print_stat("Staging kept at", &result.output_path);
    }
  }

  if !result.success {
    std::process::exit(1);
  }
  Ok(())
}
