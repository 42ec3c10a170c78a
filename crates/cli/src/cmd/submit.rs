//! Implementation of the `streamsub submit` command.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use streamsub_lib::engine::load_job_config;

use super::service::{Reported, ServiceArgs, cancel_on_interrupt, engine, print_outcome, runtime};
use crate::output::OutputFormat;

/// Start a job from an application bundle that was already built.
pub fn cmd_submit(bundle: PathBuf, job_config: Option<PathBuf>, service: &ServiceArgs, format: OutputFormat) -> Result<()> {
  if !bundle.is_file() {
    bail!("Bundle not found: {}", bundle.display());
  }
  let job_config = load_job_config(job_config.as_deref()).context("Failed to load job configuration")?;

  let rt = runtime()?;
  rt.block_on(async {
    let engine = engine(service, format, None)?;
    cancel_on_interrupt(&engine);
    let outcome = engine.submit_bundle(bundle, job_config).await.map_err(Reported)?;
    print_outcome(&outcome, format)
  })
}
