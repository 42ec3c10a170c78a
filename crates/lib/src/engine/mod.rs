//! Top-level build operations.
//!
//! An [`Engine`] runs one operation at a time: resolve credentials, obtain a
//! token, submit, poll, then download or submit the resulting bundles. Every
//! operation goes through [`Engine::run`], which reports failures to the
//! message handler, recovers from a dormant service by replaying the
//! operation once, and finally removes the consumed source archive.

mod types;

pub use types::*;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::archive::{self, ArchiveError, ArchiveRequest, SourceArchive};
use crate::artifacts::{self, DownloadReport};
use crate::client::BuildClient;
use crate::config::EngineConfig;
use crate::credentials::{Session, resolve_credentials};
use crate::handler::{Clipboard, Ignore, LintHandler, MessageHandler, NotificationId, UrlOpener};
use crate::poll::{self, PollContext};
use crate::recovery::{self, Classification, RecoveryContext, RecoveryError, RetryContext};
use crate::types::{BuildRequest, BuildStatus, BuildTarget, JobHandle};

/// Read a job configuration file; `None` gives the empty configuration.
pub fn load_job_config(path: Option<&Path>) -> Result<Value, EngineError> {
  let Some(path) = path else {
    return Ok(Value::Object(Default::default()));
  };
  let content = std::fs::read_to_string(path).map_err(|e| EngineError::JobConfig {
    path: path.to_path_buf(),
    message: e.to_string(),
  })?;
  serde_json::from_str(&content).map_err(|e| EngineError::JobConfig {
    path: path.to_path_buf(),
    message: e.to_string(),
  })
}

/// Runs build operations against a [`BuildClient`].
pub struct Engine<C: BuildClient> {
  client: C,
  config: EngineConfig,
  credentials: Option<String>,
  messages: Arc<dyn MessageHandler>,
  lint: Arc<dyn LintHandler>,
  urls: Arc<dyn UrlOpener>,
  clipboard: Arc<dyn Clipboard>,
  cancel: Arc<AtomicBool>,
}

impl<C: BuildClient> Engine<C> {
  pub fn new(client: C, config: EngineConfig, messages: Arc<dyn MessageHandler>) -> Self {
    Self {
      client,
      config,
      credentials: None,
      messages,
      lint: Arc::new(Ignore),
      urls: Arc::new(Ignore),
      clipboard: Arc::new(Ignore),
      cancel: Arc::new(AtomicBool::new(false)),
    }
  }

  /// Explicit credentials JSON, taking precedence over `VCAP_SERVICES`.
  pub fn with_credentials(mut self, json: Option<String>) -> Self {
    self.credentials = json;
    self
  }

  pub fn with_lint(mut self, lint: Arc<dyn LintHandler>) -> Self {
    self.lint = lint;
    self
  }

  pub fn with_url_opener(mut self, urls: Arc<dyn UrlOpener>) -> Self {
    self.urls = urls;
    self
  }

  pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
    self.clipboard = clipboard;
    self
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Flag that stops build and service polling at the next query when set.
  pub fn cancel_flag(&self) -> Arc<AtomicBool> {
    self.cancel.clone()
  }

  /// Assemble a source archive, reporting failures to the message handler.
  pub async fn package(&self, request: ArchiveRequest) -> Result<SourceArchive, EngineError> {
    self
      .messages
      .info(&format!("Building application archive for {}...", request.target.label()), None);

    let result = tokio::task::spawn_blocking(move || archive::assemble(&request))
      .await
      .unwrap_or_else(|e| Err(ArchiveError::Write(std::io::Error::other(e.to_string()))));

    result.map_err(|e| {
      let err = EngineError::from(e);
      self.report(&err);
      err
    })
  }

  pub async fn build_and_download(
    &self,
    archive: PathBuf,
    target: BuildTarget,
    output_dir: Option<PathBuf>,
  ) -> Result<Outcome, EngineError> {
    self
      .run(RetryCommand::BuildAndDownload {
        archive,
        target,
        output_dir,
      })
      .await
  }

  pub async fn build_and_submit(
    &self,
    archive: PathBuf,
    target: BuildTarget,
    job_config: Value,
  ) -> Result<Outcome, EngineError> {
    self
      .run(RetryCommand::BuildAndSubmit {
        archive,
        target,
        job_config,
      })
      .await
  }

  pub async fn submit_bundle(&self, bundle: PathBuf, job_config: Value) -> Result<Outcome, EngineError> {
    self.run(RetryCommand::SubmitBundle { bundle, job_config }).await
  }

  pub async fn open_console(&self) -> Result<Outcome, EngineError> {
    self.run(RetryCommand::OpenConsole).await
  }

  /// Open the cloud dashboard. Needs no credentials.
  pub fn open_dashboard(&self) -> String {
    let url = self.config.dashboard_url.clone();
    self.urls.open_url(&url);
    url
  }

  /// Run a command with error reporting and dormant-service recovery.
  ///
  /// The command's source archive, if any, is deleted afterwards whatever
  /// the outcome.
  pub async fn run(&self, command: RetryCommand) -> Result<Outcome, EngineError> {
    debug!(command = command.name(), "running command");
    let result = match self.dispatch(&command).await {
      Ok(outcome) => Ok(outcome),
      Err(err) => self.handle_failure(err, &command).await,
    };

    if let Some(archive) = command.archive() {
      delete_archive(archive).await;
    }
    result
  }

  async fn handle_failure(&self, err: EngineError, command: &RetryCommand) -> Result<Outcome, EngineError> {
    let notification = self.report(&err);

    let message = match err.client_error() {
      Some(e) if recovery::classify(e) == Classification::Recoverable => {
        e.service_message().unwrap_or_default().to_string()
      }
      _ => return Err(err),
    };

    let mut context = RetryContext::new(command.clone(), notification.into_iter().collect());
    let session = match self.open_session().await {
      Ok(session) => session,
      Err(e) => {
        self.report(&e);
        return Err(e);
      }
    };

    let ctx = RecoveryContext {
      config: &self.config,
      messages: self.messages.as_ref(),
      urls: self.urls.as_ref(),
      cancel: &self.cancel,
    };
    match recovery::recover(&self.client, &session, &ctx, &message, &mut context).await {
      Ok(()) => {}
      Err(RecoveryError::Declined) => return Err(err),
      Err(RecoveryError::Client(e)) => return Err(EngineError::Client(e)),
      Err(RecoveryError::Cancelled) => return Err(EngineError::Cancelled),
    }

    info!(command = context.command.name(), "replaying command");
    self.dispatch(&context.command).await.inspect_err(|e| {
      self.report(e);
    })
  }

  /// Show an error to the user. Build failures were already reported by the poller.
  fn report(&self, err: &EngineError) -> Option<NotificationId> {
    match err {
      EngineError::BuildFailed { .. } => None,
      EngineError::Credentials(e) => {
        let id = self.messages.error(
          "Unable to determine Streaming Analytics service credentials.",
          Some(&e.to_string()),
        );
        self.messages.credentials_missing(id);
        Some(id)
      }
      other => Some(self.messages.error(&other.to_string(), None)),
    }
  }

  async fn open_session(&self) -> Result<Session, EngineError> {
    let credentials = resolve_credentials(self.credentials.as_deref())?;
    let token = self.client.exchange_token(&credentials.api_key).await?;
    debug!(rest_url = %credentials.rest_url, "session established");
    Ok(Session::new(credentials, token))
  }

  async fn dispatch(&self, command: &RetryCommand) -> Result<Outcome, EngineError> {
    match command {
      RetryCommand::BuildAndDownload {
        archive,
        target,
        output_dir,
      } => {
        let session = self.open_session().await?;
        let status = self.build(&session, archive, target).await?;
        let output_dir = output_dir
          .clone()
          .unwrap_or_else(|| artifacts::default_output_dir(archive));
        let report = self.download(&session, &status, &output_dir).await?;
        Ok(Outcome::Downloaded(report))
      }
      RetryCommand::BuildAndSubmit {
        archive,
        target,
        job_config,
      } => {
        let session = self.open_session().await?;
        let status = self.build(&session, archive, target).await?;
        for artifact in &status.artifacts {
          self.messages.info(
            &format!("Submitting application {} to the Streaming Analytics service...", artifact.name),
            None,
          );
        }
        let jobs = artifacts::submit_all(&self.client, &session, &status.artifacts, job_config).await?;
        Ok(self.report_jobs(&session, jobs).await)
      }
      RetryCommand::SubmitBundle { bundle, job_config } => {
        let session = self.open_session().await?;
        let name = bundle
          .file_name()
          .map(|n| n.to_string_lossy().to_string())
          .unwrap_or_else(|| bundle.display().to_string());
        self.messages.info(
          &format!("Submitting application {} to the Streaming Analytics service...", name),
          None,
        );
        let job = self.client.submit_bundle(&session, bundle, job_config).await?;
        Ok(self.report_jobs(&session, vec![job]).await)
      }
      RetryCommand::OpenConsole => {
        let session = self.open_session().await?;
        let info = self.client.get_service_info(&session).await?;
        let url = info.console_url().ok_or(EngineError::NoConsoleUrl)?;
        self.urls.open_url(&url);
        Ok(Outcome::Console { url })
      }
    }
  }

  /// Submit the archive and poll the build to success.
  async fn build(&self, session: &Session, archive: &Path, target: &BuildTarget) -> Result<BuildStatus, EngineError> {
    let originator = self.config.originator.to_string();
    let submitted = self.client.submit_source(session, archive, &originator).await?;
    let request = BuildRequest {
      id: submitted.id,
      output_id: submitted.output_id,
      target: target.clone(),
      originator,
    };

    let ctx = PollContext {
      config: &self.config,
      messages: self.messages.as_ref(),
      lint: self.lint.as_ref(),
      cancel: &self.cancel,
    };
    let outcome = poll::poll_build(&self.client, session, &request, &ctx).await?;
    Ok(outcome.status)
  }

  async fn download(
    &self,
    session: &Session,
    status: &BuildStatus,
    output_dir: &Path,
  ) -> Result<DownloadReport, EngineError> {
    if status.artifacts.is_empty() {
      warn!("build produced no artifacts");
      return Ok(DownloadReport {
        output_dir: output_dir.to_path_buf(),
        files: Vec::new(),
      });
    }

    let report = artifacts::download_all(&self.client, session, &status.artifacts, output_dir).await?;
    for (artifact, file) in status.artifacts.iter().zip(&report.files) {
      self.messages.success(
        &format!("Application {} bundle downloaded to output directory", artifact.name),
        Some(&file.display().to_string()),
      );
    }
    self.clipboard.write_text(&output_dir.display().to_string());
    Ok(report)
  }

  async fn report_jobs(&self, session: &Session, jobs: Vec<JobHandle>) -> Outcome {
    let console_url = match self.client.get_service_info(session).await {
      Ok(info) => info.console_url(),
      Err(e) => {
        warn!(error = %e, "failed to look up console URL");
        None
      }
    };
    if console_url.is_none() {
      self.messages.error("Cannot retrieve Streaming Analytics Console URL", None);
    }

    let jobs = jobs
      .into_iter()
      .map(|job| {
        self
          .messages
          .success(&format!("Job {} is {}", job.name, job.health), console_url.as_deref());
        JobReport {
          job,
          console_url: console_url.clone(),
        }
      })
      .collect();
    Outcome::Submitted { jobs }
  }
}

/// Remove a consumed source archive. Failure is logged and otherwise ignored.
async fn delete_archive(archive: &Path) {
  match tokio::fs::remove_file(archive).await {
    Ok(()) => debug!(path = %archive.display(), "deleted source archive"),
    Err(e) => warn!(path = %archive.display(), error = %e, "failed to delete archive"),
  }
}
