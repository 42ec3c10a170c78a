//! Implementation of the `streamsub console` command.

use anyhow::Result;

use super::service::{Reported, ServiceArgs, engine, print_outcome, runtime};
use crate::output::OutputFormat;

/// Look up the service console URL.
pub fn cmd_console(service: &ServiceArgs, format: OutputFormat) -> Result<()> {
  let rt = runtime()?;
  rt.block_on(async {
    let engine = engine(service, format, None)?;
    let outcome = engine.open_console().await.map_err(Reported)?;
    print_outcome(&outcome, format)
  })
}
