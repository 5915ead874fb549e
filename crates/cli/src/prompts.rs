use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use vpack_lib::build::DestinationPrompt;
use vpack_lib::content::ContentDescriptor;

/// Destination chooser for the CLI.
///
/// Uses the preset directory when one was given on the command line or in
/// the project file; otherwise asks on the terminal. Non-interactive runs
/// with no preset get no destination.
pub struct TerminalPrompt {
  preset: Option<PathBuf>,
}

impl TerminalPrompt {
  pub fn new(preset: Option<PathBuf>) -> Self {
    Self { preset }
  }
}

impl DestinationPrompt for TerminalPrompt {
  fn choose(&self, descriptor: &ContentDescriptor) -> Option<PathBuf> {
    if let Some(preset) = &self.preset {
      return Some(preset.clone());
    }

    if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
      return None;
    }

    let message = format!(
      "Directory to save {}.{} in (empty to cancel)",
      descriptor.display_name,
      descriptor.kind.extension()
    );
    match ask(&message) {
      Ok(answer) if !answer.is_empty() => Some(PathBuf::from(answer)),
      _ => None,
    }
  }
}

fn ask(message: &str) -> io::Result<String> {
  write!(io::stderr(), "{}: ", message)?;
  io::stderr().flush()?;

  let mut input = String::new();
  io::stdin().read_line(&mut input)?;
  Ok(input.trim().to_string())
}
