mod cmd;
mod output;
mod prompts;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vpack_lib::config::PROJECT_FILE;
use vpack_lib::platform::PlatformTarget;

use crate::output::OutputFormat;

/// vpack - build and package content for every platform
#[derive(Parser)]
#[command(name = "vpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Raise log verbosity (-v info, -vv debug); RUST_LOG overrides
  #[arg(short, long, global = true, action = ArgAction::Count)]
  verbose: u8,

  /// Path to the project file
  #[arg(short, long, global = true, default_value = PROJECT_FILE)]
  project: PathBuf,

  /// Output format
  #[arg(short = 'o', long, global = true, value_enum, default_value = "text")]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every enabled platform and write the package
  Build {
    /// Directory to write the package to
    #[arg(long)]
    out: Option<PathBuf>,

    /// Delete the staging directory when the build fails
    #[arg(long)]
    purge_on_failure: bool,
  },

  /// Validate the content and save any corrections
  Validate,

  /// Build one platform into the manual folder
  BuildPlatform {
    /// Platform to build (win, mac, aos, ios, web)
    platform: PlatformTarget,
  },

  /// Package the platforms in the manual folder
  Package {
    /// Directory to write the package to
    #[arg(long)]
    out: Option<PathBuf>,
  },

  /// Build the world for the editor platform into the local test folder
  TestLocal {
    /// Directory a running client loads local builds from
    #[arg(long)]
    dir: Option<PathBuf>,
  },

  /// List a package's entries and check its hashes
  Verify {
    /// Package file to check
    archive: PathBuf,
  },
}

fn init_logging(verbose: u8) {
  let level = match verbose {
    0 => "warn",
    1 => "info",
    _ => "debug",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  match cli.command {
    Commands::Build { out, purge_on_failure } => cmd::cmd_build(&cli.project, out, purge_on_failure, cli.output),
    Commands::Validate => cmd::cmd_validate(&cli.project, cli.output),
    Commands::BuildPlatform { platform } => cmd::cmd_build_platform(&cli.project, platform, cli.output),
    Commands::Package { out } => cmd::cmd_package(&cli.project, out, cli.output),
    Commands::TestLocal { dir } => cmd::cmd_test_local(&cli.project, dir, cli.output),
    Commands::Verify { archive } => cmd::cmd_verify(&archive, cli.output),
  }
}
