//! Engine configuration.
//!
//! Defaults match the remote service's expected cadence; a few values can be
//! overridden from the environment so tests and staging setups can point the
//! engine at another identity endpoint.

use std::time::Duration;

use crate::consts::{
  APP_NAME, BUILD_POLL_INTERVAL, DASHBOARD_URL_ENV, DEFAULT_DASHBOARD_URL, DEFAULT_TOKEN_URL, OUTPUT_NOTIFY_EVERY,
  SERVICE_POLL_INTERVAL, TOKEN_URL_ENV,
};

/// Identifies the tool submitting builds, sent as the `originator` query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Originator {
  pub name: String,
  pub version: String,
  pub kind: String,
}

impl Originator {
  pub fn new(name: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      version: version.into(),
      kind: kind.into(),
    }
  }
}

impl Default for Originator {
  fn default() -> Self {
    Self::new(APP_NAME, env!("CARGO_PKG_VERSION"), "cli")
  }
}

impl std::fmt::Display for Originator {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}-{}:{}", self.name, self.version, self.kind)
  }
}

/// Configuration for the build engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Delay between build status queries.
  pub build_poll_interval: Duration,

  /// Delay between service state queries while waiting for a service start.
  pub service_poll_interval: Duration,

  /// Build output is forwarded to the message handler every N poll ticks.
  pub notify_every: u32,

  /// Token exchange endpoint.
  pub token_url: String,

  /// Dashboard opened when the user chooses to inspect a dormant service.
  pub dashboard_url: String,

  /// Originator attached to source submissions.
  pub originator: Originator,

  /// Per-request timeout. `None` leaves the transport default in place.
  pub request_timeout: Option<Duration>,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      build_poll_interval: BUILD_POLL_INTERVAL,
      service_poll_interval: SERVICE_POLL_INTERVAL,
      notify_every: OUTPUT_NOTIFY_EVERY,
      token_url: DEFAULT_TOKEN_URL.to_string(),
      dashboard_url: DEFAULT_DASHBOARD_URL.to_string(),
      originator: Originator::default(),
      request_timeout: None,
    }
  }
}

impl EngineConfig {
  /// Default configuration with environment overrides applied.
  ///
  /// - `STREAMSUB_TOKEN_URL`: token exchange endpoint
  /// - `STREAMSUB_DASHBOARD_URL`: cloud dashboard URL
  pub fn from_env() -> Self {
    let mut config = Self::default();
    if let Ok(url) = std::env::var(TOKEN_URL_ENV)
      && !url.trim().is_empty()
    {
      config.token_url = url;
    }
    if let Ok(url) = std::env::var(DASHBOARD_URL_ENV)
      && !url.trim().is_empty()
    {
      config.dashboard_url = url;
    }
    config
  }

  /// Set the originator.
  pub fn with_originator(mut self, originator: Originator) -> Self {
    self.originator = originator;
    self
  }

  /// Set a per-request timeout.
  pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.request_timeout = timeout;
    self
  }
}
