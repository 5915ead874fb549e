//! Implementation of the `vpack validate` command.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use vpack_lib::content::ContentProperty;

use super::{load_project, pipeline};
use crate::output::{OutputFormat, print_error, print_info, print_json, print_stat, print_success, print_warning};

#[derive(Debug, Serialize)]
struct ValidateOutput {
  valid: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
  corrections: Vec<String>,
  properties: Vec<ContentProperty>,
}

/// Run global validation and save whatever it corrected.
pub fn cmd_validate(project_path: &Path, output: OutputFormat) -> Result<()> {
  let project = load_project(project_path)?;
  let content = &project.config.content;
  let pipeline = pipeline(&project, project.build_options(), None);

  let report = match pipeline.validate_content(content) {
    Ok(validated) => ValidateOutput {
      valid: true,
      error: None,
      corrections: validated.corrections.iter().map(ToString::to_string).collect(),
      properties: validated.properties,
    },
    Err(e) => ValidateOutput {
      valid: false,
      error: Some(e.to_string()),
      corrections: Vec::new(),
      properties: Vec::new(),
    },
  };

  if output.is_json() {
    print_json(&report)?;
  } else if let Some(error) = &report.error {
    print_error(&format!("{}: {}", content.display_name, error));
  } else {
    print_success(&format!("{} is valid", content.display_name));
    for correction in &report.corrections {
      print_info(&format!("corrected {}", correction));
    }
    print_stat("Properties", &report.properties.len().to_string());
    if content.enabled_platforms().is_empty() {
      print_warning("no platform selected");
    }
  }

  if !report.valid {
    std::process::exit(1);
  }
  Ok(())
}
