//! Domain types shared by the client, poller and artifact manager.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What the build service should compile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildTarget {
  /// Compile a single main composite, identified by its fully-qualified name.
  Composite(String),
  /// Use the application's existing build file.
  Makefile(PathBuf),
}

impl BuildTarget {
  /// Human-readable label used in progress messages.
  pub fn label(&self) -> String {
    match self {
      BuildTarget::Composite(fqn) => fqn.clone(),
      BuildTarget::Makefile(path) => path.display().to_string(),
    }
  }

  pub fn is_makefile(&self) -> bool {
    matches!(self, BuildTarget::Makefile(_))
  }
}

/// A build accepted by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildRequest {
  pub id: String,
  pub output_id: String,
  pub target: BuildTarget,
  pub originator: String,
}

/// Lifecycle of a build as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
  Submitted,
  Building,
  Built,
  Failed,
}

impl BuildState {
  /// Parse the service's status string.
  pub fn parse(value: &str) -> Option<Self> {
    match value {
      "submitted" => Some(BuildState::Submitted),
      "building" => Some(BuildState::Building),
      "built" => Some(BuildState::Built),
      "failed" => Some(BuildState::Failed),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      BuildState::Submitted => "submitted",
      BuildState::Building => "building",
      BuildState::Built => "built",
      BuildState::Failed => "failed",
    }
  }

  /// Built and failed end the build; nothing follows them.
  pub fn is_terminal(&self) -> bool {
    matches!(self, BuildState::Built | BuildState::Failed)
  }

  /// Ordering used to keep transitions monotonic.
  fn rank(&self) -> u8 {
    match self {
      BuildState::Submitted => 0,
      BuildState::Building => 1,
      BuildState::Built | BuildState::Failed => 2,
    }
  }

  /// Whether moving from `self` to `next` goes backwards.
  pub fn regresses_to(&self, next: BuildState) -> bool {
    next.rank() < self.rank() || (self.is_terminal() && next != *self)
  }
}

impl std::fmt::Display for BuildState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One line of build output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMessage {
  pub message_text: String,
}

impl BuildMessage {
  pub fn new(text: impl Into<String>) -> Self {
    Self {
      message_text: text.into(),
    }
  }
}

/// A compiled bundle produced by a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
  pub id: String,
  pub name: String,
  pub download_url: String,
  pub submit_job_url: String,
}

/// One observation of a build's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildStatus {
  pub status: BuildState,
  pub output: Vec<BuildMessage>,
  /// Only populated when `status` is [`BuildState::Built`].
  pub artifacts: Vec<Artifact>,
}

impl BuildStatus {
  pub fn new(status: BuildState, output: Vec<BuildMessage>) -> Self {
    Self {
      status,
      output,
      artifacts: Vec::new(),
    }
  }

  pub fn with_artifacts(mut self, artifacts: Vec<Artifact>) -> Self {
    self.artifacts = artifacts;
    self
  }
}

/// A job started from a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
  pub id: String,
  pub name: String,
  pub health: String,
}

/// State of the remote compute service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ServiceState {
  Started,
  Starting,
  Stopping,
  Stopped,
  Other(String),
}

impl ServiceState {
  pub fn parse(value: &str) -> Self {
    match value.to_ascii_uppercase().as_str() {
      "STARTED" => ServiceState::Started,
      "STARTING" => ServiceState::Starting,
      "STOPPING" => ServiceState::Stopping,
      "STOPPED" => ServiceState::Stopped,
      _ => ServiceState::Other(value.to_string()),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      ServiceState::Started => "STARTED",
      ServiceState::Starting => "STARTING",
      ServiceState::Stopping => "STOPPING",
      ServiceState::Stopped => "STOPPED",
      ServiceState::Other(value) => value,
    }
  }
}

impl std::fmt::Display for ServiceState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Instance information returned by the service root endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInfo {
  pub id: Option<String>,
  pub state: Option<ServiceState>,
  pub streams_console: Option<String>,
}

impl ServiceInfo {
  pub fn is_started(&self) -> bool {
    self.state == Some(ServiceState::Started)
  }

  /// Console dashboard URL for this instance, when the service reported one.
  pub fn console_url(&self) -> Option<String> {
    match (&self.streams_console, &self.id) {
      (Some(console), Some(id)) => Some(format!(
        "{}#application/dashboard/Application%20Dashboard?instance={}",
        console, id
      )),
      _ => None,
    }
  }
}
