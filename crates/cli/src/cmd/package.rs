//! Implementation of the `streamsub package` command.
//!
//! Assembles the source archive a build would submit and leaves it on disk,
//! listing what went into it.

use anyhow::{Context, Result};

use streamsub_lib::archive;

use super::build::TargetArgs;
use crate::output::{OutputFormat, format_bytes, print_json, print_stat, print_success, symbols};

pub fn cmd_package(target: &TargetArgs, verbose: bool, format: OutputFormat) -> Result<()> {
  let resolved = target.resolve()?;
  let request = target.archive_request(&resolved);
  let source = archive::assemble(&request).context("Failed to assemble source archive")?;

  if format.is_json() {
    return print_json(&source);
  }

  let size = std::fs::metadata(&source.path).map(|m| m.len()).unwrap_or(0);
  print_success(format, &format!("Archive written for {}", resolved.target.label()));
  print_stat(format, "Path", &source.path.display().to_string());
  print_stat(format, "Size", &format_bytes(size));
  print_stat(format, "Entries", &source.entries.len().to_string());
  if !source.toolkits.is_empty() {
    print_stat(format, "Toolkits", &source.toolkits.join(", "));
  }

  if verbose {
    println!();
    for entry in &source.entries {
      println!("  {} {}", symbols::ARROW, entry);
    }
  }

  Ok(())
}
