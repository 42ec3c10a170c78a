//! Engine errors, commands and results.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::artifacts::{ArtifactError, DownloadReport};
use crate::client::ClientError;
use crate::credentials::CredentialsError;
use crate::poll::PollError;
use crate::types::{BuildMessage, BuildTarget, JobHandle};

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  Configuration,
  Archive,
  Network,
  Service,
  BuildFailure,
  BatchArtifact,
  Cancelled,
}

/// Errors from a top-level engine operation.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error(transparent)]
  Credentials(#[from] CredentialsError),

  #[error("invalid job configuration '{path}': {message}")]
  JobConfig { path: PathBuf, message: String },

  #[error(transparent)]
  Archive(#[from] ArchiveError),

  #[error(transparent)]
  Client(#[from] ClientError),

  #[error("build failed - {target}")]
  BuildFailed { target: String, output: Vec<BuildMessage> },

  #[error(transparent)]
  Artifacts(#[from] ArtifactError),

  #[error("the service did not report a console URL")]
  NoConsoleUrl,

  #[error("operation cancelled")]
  Cancelled,
}

impl EngineError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      EngineError::Credentials(_) | EngineError::JobConfig { .. } => ErrorKind::Configuration,
      EngineError::Archive(_) => ErrorKind::Archive,
      EngineError::Client(e) => match e {
        ClientError::Setup(_) | ClientError::Network { .. } => ErrorKind::Network,
        ClientError::ReadFile { .. } => ErrorKind::Archive,
        ClientError::Service { .. } | ClientError::Status { .. } | ClientError::Decode { .. } => ErrorKind::Service,
      },
      EngineError::BuildFailed { .. } => ErrorKind::BuildFailure,
      EngineError::Artifacts(_) => ErrorKind::BatchArtifact,
      EngineError::NoConsoleUrl => ErrorKind::Service,
      EngineError::Cancelled => ErrorKind::Cancelled,
    }
  }

  /// The service round trip behind this error, including one that failed a
  /// download or job-submission batch.
  pub fn client_error(&self) -> Option<&ClientError> {
    match self {
      EngineError::Client(e) => Some(e),
      EngineError::Artifacts(ArtifactError::Batch { source, .. }) => Some(source),
      _ => None,
    }
  }
}

impl From<PollError> for EngineError {
  fn from(err: PollError) -> Self {
    match err {
      PollError::Client(e) => EngineError::Client(e),
      PollError::BuildFailed { target, output } => EngineError::BuildFailed { target, output },
      PollError::Cancelled => EngineError::Cancelled,
    }
  }
}


/// A top-level operation, kept so it can be replayed after recovery.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryCommand {
  /// Build an archive and download the resulting bundles.
  BuildAndDownload {
    archive: PathBuf,
    target: BuildTarget,
    output_dir: Option<PathBuf>,
  },
  /// Build an archive and start a job from each resulting bundle.
  BuildAndSubmit {
    archive: PathBuf,
    target: BuildTarget,
    job_config: Value,
  },
  /// Start a job from an existing bundle.
  SubmitBundle { bundle: PathBuf, job_config: Value },
  /// Look up the console URL and open it.
  OpenConsole,
}

impl RetryCommand {
  /// The source archive this command consumes.
  pub fn archive(&self) -> Option<&Path> {
    match self {
      RetryCommand::BuildAndDownload { archive, .. } | RetryCommand::BuildAndSubmit { archive, .. } => Some(archive),
      RetryCommand::SubmitBundle { .. } | RetryCommand::OpenConsole => None,
    }
  }

  pub fn name(&self) -> &'static str {
    match self {
      RetryCommand::BuildAndDownload { .. } => "build-and-download",
      RetryCommand::BuildAndSubmit { .. } => "build-and-submit",
      RetryCommand::SubmitBundle { .. } => "submit-bundle",
      RetryCommand::OpenConsole => "open-console",
    }
  }
}

/// A started job and where to watch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
  pub job: JobHandle,
  pub console_url: Option<String>,
}

/// Result of a top-level operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
  Downloaded(DownloadReport),
  Submitted { jobs: Vec<JobReport> },
  Console { url: String },
}
