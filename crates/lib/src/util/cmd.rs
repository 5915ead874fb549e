//! External command execution for the bundler and the environment refresh hook.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CommandError {
  #[error("command is empty")]
  Empty,

  #[error("failed to spawn {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("command failed with exit code {code:?}: {cmd}: {stderr}")]
  Failed {
    cmd: String,
    code: Option<i32>,
    stderr: String,
  },
}

/// A program and its arguments, with `{name}` placeholders.
///
/// The command is run directly, not through a shell, so substituted values
/// never need quoting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandSpec(pub Vec<String>);

impl CommandSpec {
  pub fn new<I, S>(argv: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self(argv.into_iter().map(Into::into).collect())
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Substitute every `{key}` in every argument.
  pub fn render(&self, vars: &BTreeMap<&str, String>) -> Vec<String> {
    self.0.iter().map(|arg| substitute(arg, vars)).collect()
  }
}

fn substitute(template: &str, vars: &BTreeMap<&str, String>) -> String {
  vars
    .iter()
    .fold(template.to_string(), |acc, (key, value)| acc.replace(&format!("{{{key}}}"), value))
}

/// Run a rendered command to completion and return its trimmed stdout.
pub async fn run_command(
  argv: &[String],
  cwd: Option<&Path>,
  env: &BTreeMap<String, String>,
) -> Result<String, CommandError> {
  let (program, args) = argv.split_first().ok_or(CommandError::Empty)?;
  let cmd_line = argv.join(" ");
  info!(cmd = %cmd_line, "executing command");

  let mut command = Command::new(program);
  command.args(args).envs(env).kill_on_drop(true);
  if let Some(cwd) = cwd {
    command.current_dir(cwd);
  }

  let output = command.output().await.map_err(|source| CommandError::Spawn {
    program: program.clone(),
    source,
  })?;

  let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
  let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

  if !output.status.success() {
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "command stdout");
    }
    return Err(CommandError::Failed {
      cmd: cmd_line,
      code: output.status.code(),
      stderr,
    });
  }

  if !stdout.is_empty() {
    debug!(stdout = %stdout, "command output");
  }
  Ok(stdout)
}
