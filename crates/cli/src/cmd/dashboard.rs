//! Implementation of the `streamsub dashboard` command.

use anyhow::Result;
use serde_json::json;

use super::service::{ServiceArgs, engine};
use crate::output::{OutputFormat, print_json};

/// Show the cloud dashboard URL. Needs no credentials.
pub fn cmd_dashboard(format: OutputFormat) -> Result<()> {
  let engine = engine(&ServiceArgs::default(), format, None)?;
  let url = engine.open_dashboard();

  if format.is_json() {
    print_json(&json!({ "url": url }))?;
  }
  Ok(())
}
