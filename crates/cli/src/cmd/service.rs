//! Shared plumbing for commands that talk to the build service.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{debug, info};

use streamsub_lib::client::HttpBuildClient;
use streamsub_lib::config::EngineConfig;
use streamsub_lib::consts::CREDENTIALS_ENV;
use streamsub_lib::engine::{Engine, EngineError, Outcome};

use crate::output::{OutputFormat, print_json, print_stat, print_success};
use crate::terminal::Terminal;

/// An engine failure the terminal handler has already shown to the user.
#[derive(Debug)]
pub struct Reported(pub EngineError);

impl fmt::Display for Reported {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

impl std::error::Error for Reported {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    std::error::Error::source(&self.0)
  }
}

/// Options for reaching the build service.
#[derive(Debug, Clone, Default, Args)]
pub struct ServiceArgs {
  /// Service credentials JSON (falls back to STREAMSUB_CREDENTIALS, then VCAP_SERVICES)
  #[arg(long, value_name = "JSON")]
  pub credentials: Option<String>,

  /// Start a stopped service without asking
  #[arg(long)]
  pub auto_start: bool,

  /// Per-request timeout, e.g. "30s" or "2m"
  #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
  pub timeout: Option<Duration>,
}

impl ServiceArgs {
  /// Explicit credentials from the flag, else from the environment.
  fn credentials(&self) -> Option<String> {
    self
      .credentials
      .clone()
      .or_else(|| std::env::var(CREDENTIALS_ENV).ok())
      .filter(|c| !c.trim().is_empty())
  }
}

/// Build an engine wired to the terminal.
pub fn engine(args: &ServiceArgs, format: OutputFormat, app_root: Option<PathBuf>) -> Result<Engine<HttpBuildClient>> {
  let config = EngineConfig::from_env().with_request_timeout(args.timeout);
  let client = HttpBuildClient::new(&config).context("Failed to create HTTP client")?;
  let terminal = Arc::new(
    Terminal::new(format)
      .with_auto_start(args.auto_start)
      .with_app_root(app_root),
  );
  debug!(token_url = %config.token_url, timeout = ?config.request_timeout, "engine configured");

  Ok(
    Engine::new(client, config, terminal.clone())
      .with_credentials(args.credentials())
      .with_lint(terminal.clone())
      .with_url_opener(terminal.clone())
      .with_clipboard(terminal),
  )
}

pub fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}

/// Stop polling at the next query on Ctrl-C.
pub fn cancel_on_interrupt(engine: &Engine<HttpBuildClient>) {
  let flag = engine.cancel_flag();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      info!("interrupt received, cancelling");
      flag.store(true, Ordering::SeqCst);
    }
  });
}

pub fn print_outcome(outcome: &Outcome, format: OutputFormat) -> Result<()> {
  if format.is_json() {
    return print_json(outcome);
  }

  match outcome {
    Outcome::Downloaded(report) => {
      println!();
      print_success(format, &format!("{} bundle(s) downloaded", report.files.len()));
      print_stat(format, "Output", &report.output_dir.display().to_string());
    }
    Outcome::Submitted { jobs } => {
      println!();
      print_success(format, &format!("{} job(s) submitted", jobs.len()));
      for report in jobs {
        print_stat(format, &report.job.name, &report.job.health);
      }
      if let Some(url) = jobs.iter().find_map(|j| j.console_url.as_deref()) {
        print_stat(format, "Console", url);
      }
    }
    // Shown by the URL opener.
    Outcome::Console { .. } => {}
  }
  Ok(())
}
