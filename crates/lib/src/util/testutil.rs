//! Test doubles for the build client and host collaborators.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use crate::client::{BuildClient, ClientError, SubmittedBuild};
use crate::credentials::{AccessToken, ServiceCredentials, Session};
use crate::handler::{Clipboard, LintHandler, MessageHandler, NotificationId, Remediation, UrlOpener};
use crate::types::{Artifact, BuildMessage, BuildRequest, BuildStatus, JobHandle, ServiceInfo, ServiceState};

pub fn messages(texts: &[&str]) -> Vec<BuildMessage> {
  texts.iter().map(|t| BuildMessage::new(*t)).collect()
}

pub fn session() -> Session {
  Session::new(
    ServiceCredentials::new("k1", "https://service.example/v2/instances/i1"),
    AccessToken::new("token-for-k1"),
  )
}

pub fn artifact(id: &str, name: &str) -> Artifact {
  Artifact {
    id: id.to_string(),
    name: name.to_string(),
    download_url: format!("https://service.example/artifacts/{}", id),
    submit_job_url: "https://service.example/jobs".to_string(),
  }
}

pub fn dormant_error() -> ClientError {
  ClientError::Service {
    status: Some(409),
    message: "CDISB4090E The Streaming Analytics service is not running.".to_string(),
  }
}

pub fn service_info(state: ServiceState) -> ServiceInfo {
  ServiceInfo {
    id: Some("i1".to_string()),
    state: Some(state),
    streams_console: Some("https://console.example".to_string()),
  }
}

/// A request observed by [`ScriptedClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
  Token(String),
  Submit { archive: PathBuf, originator: String },
  Status(String),
  Download(String),
  SubmitJob(String),
  SubmitBundle(PathBuf),
  PatchService(ServiceState),
  ServiceInfo,
}

/// A [`BuildClient`] answering from scripted queues.
///
/// Empty queues fall back to a successful answer, except build status which
/// has no sensible default and fails with a decode error.
#[derive(Default)]
pub struct ScriptedClient {
  calls: Mutex<Vec<Call>>,
  submits: Mutex<VecDeque<Result<SubmittedBuild, ClientError>>>,
  statuses: Mutex<VecDeque<Result<BuildStatus, ClientError>>>,
  downloads: Mutex<HashMap<String, Vec<u8>>>,
  download_errors: Mutex<HashMap<String, VecDeque<ClientError>>>,
  patches: Mutex<VecDeque<Result<ServiceInfo, ClientError>>>,
  infos: Mutex<VecDeque<Result<ServiceInfo, ClientError>>>,
}

impl ScriptedClient {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_submit_error(self, error: ClientError) -> Self {
    self.submits.lock().unwrap().push_back(Err(error));
    self
  }

  pub fn with_status(self, status: BuildStatus) -> Self {
    self.statuses.lock().unwrap().push_back(Ok(status));
    self
  }

  pub fn with_status_error(self, error: ClientError) -> Self {
    self.statuses.lock().unwrap().push_back(Err(error));
    self
  }

  /// Payload served for the artifact with `id`; unknown ids answer 404.
  pub fn with_download(self, id: &str, bytes: Vec<u8>) -> Self {
    self.downloads.lock().unwrap().insert(id.to_string(), bytes);
    self
  }

  /// Fail the next download of `id` before falling back to its bytes.
  pub fn with_download_error(self, id: &str, error: ClientError) -> Self {
    self
      .download_errors
      .lock()
      .unwrap()
      .entry(id.to_string())
      .or_default()
      .push_back(error);
    self
  }

  pub fn with_patch_result(self, info: ServiceInfo) -> Self {
    self.patches.lock().unwrap().push_back(Ok(info));
    self
  }

  pub fn with_patch_error(self, error: ClientError) -> Self {
    self.patches.lock().unwrap().push_back(Err(error));
    self
  }

  pub fn with_service_info(self, info: ServiceInfo) -> Self {
    self.infos.lock().unwrap().push_back(Ok(info));
    self
  }

  pub fn calls(&self) -> Vec<Call> {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|c| !matches!(c, Call::Token(_)))
      .cloned()
      .collect()
  }

  pub fn all_calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  pub fn status_queries(&self) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|c| matches!(c, Call::Status(_)))
      .count()
  }

  pub fn submissions(&self) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|c| matches!(c, Call::Submit { .. }))
      .count()
  }

  fn record(&self, call: Call) {
    self.calls.lock().unwrap().push(call);
  }
}

impl BuildClient for ScriptedClient {
  async fn exchange_token(&self, api_key: &str) -> Result<AccessToken, ClientError> {
    self.record(Call::Token(api_key.to_string()));
    Ok(AccessToken::new(format!("token-for-{}", api_key)))
  }

  async fn submit_source(
    &self,
    _session: &Session,
    archive: &Path,
    originator: &str,
  ) -> Result<SubmittedBuild, ClientError> {
    self.record(Call::Submit {
      archive: archive.to_path_buf(),
      originator: originator.to_string(),
    });
    self.submits.lock().unwrap().pop_front().unwrap_or_else(|| {
      Ok(SubmittedBuild {
        id: "b1".to_string(),
        output_id: "o1".to_string(),
      })
    })
  }

  async fn get_status(&self, _session: &Session, build: &BuildRequest) -> Result<BuildStatus, ClientError> {
    self.record(Call::Status(build.id.clone()));
    self
      .statuses
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or_else(|| Err(ClientError::decode("scripted", "no scripted status left")))
  }

  async fn download_artifact(&self, _session: &Session, artifact: &Artifact) -> Result<Vec<u8>, ClientError> {
    self.record(Call::Download(artifact.id.clone()));
    if let Some(error) = self
      .download_errors
      .lock()
      .unwrap()
      .get_mut(&artifact.id)
      .and_then(VecDeque::pop_front)
    {
      return Err(error);
    }
    match self.downloads.lock().unwrap().get(&artifact.id) {
      Some(bytes) => Ok(bytes.clone()),
      None => Err(ClientError::Status {
        url: artifact.download_url.clone(),
        status: 404,
        body: String::new(),
      }),
    }
  }

  async fn submit_job(
    &self,
    _session: &Session,
    artifact: &Artifact,
    _job_config: &Value,
  ) -> Result<JobHandle, ClientError> {
    self.record(Call::SubmitJob(artifact.id.clone()));
    Ok(JobHandle {
      id: artifact.id.clone(),
      name: format!("{}_job", artifact.name),
      health: "healthy".to_string(),
    })
  }

  async fn submit_bundle(&self, _session: &Session, bundle: &Path, _job_config: &Value) -> Result<JobHandle, ClientError> {
    self.record(Call::SubmitBundle(bundle.to_path_buf()));
    Ok(JobHandle {
      id: "j1".to_string(),
      name: "bundle_job".to_string(),
      health: "healthy".to_string(),
    })
  }

  async fn patch_service_state(&self, _session: &Session, desired: ServiceState) -> Result<ServiceInfo, ClientError> {
    self.record(Call::PatchService(desired));
    self
      .patches
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or_else(|| Ok(service_info(ServiceState::Started)))
  }

  async fn get_service_info(&self, _session: &Session) -> Result<ServiceInfo, ClientError> {
    self.record(Call::ServiceInfo);
    self
      .infos
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or_else(|| Ok(service_info(ServiceState::Started)))
  }
}

/// A message observed by [`RecordingHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
  Info { message: String, detail: Option<String> },
  Error { message: String, detail: Option<String> },
  Success { message: String, detail: Option<String> },
  CredentialsMissing(NotificationId),
  Dismissed(NotificationId),
  Dormant(String),
}

impl Event {
  pub fn info(message: &str, detail: Option<&str>) -> Self {
    Event::Info {
      message: message.to_string(),
      detail: detail.map(String::from),
    }
  }

  pub fn error(message: &str, detail: Option<&str>) -> Self {
    Event::Error {
      message: message.to_string(),
      detail: detail.map(String::from),
    }
  }

  pub fn success(message: &str, detail: Option<&str>) -> Self {
    Event::Success {
      message: message.to_string(),
      detail: detail.map(String::from),
    }
  }
}

/// A [`MessageHandler`] that records everything and answers dormant-service
/// prompts from a script, dismissing once the script runs out.
#[derive(Default)]
pub struct RecordingHandler {
  events: Mutex<Vec<Event>>,
  next_id: AtomicU64,
  remediations: Mutex<VecDeque<Remediation>>,
}

impl RecordingHandler {
  pub fn with_remediations(remediations: impl IntoIterator<Item = Remediation>) -> Self {
    Self {
      remediations: Mutex::new(remediations.into_iter().collect()),
      ..Self::default()
    }
  }

  pub fn events(&self) -> Vec<Event> {
    self.events.lock().unwrap().clone()
  }

  pub fn dismissed(&self) -> Vec<NotificationId> {
    self
      .events()
      .into_iter()
      .filter_map(|e| match e {
        Event::Dismissed(id) => Some(id),
        _ => None,
      })
      .collect()
  }

  pub fn dormant_prompts(&self) -> usize {
    self
      .events()
      .iter()
      .filter(|e| matches!(e, Event::Dormant(_)))
      .count()
  }

  pub fn errors(&self) -> Vec<String> {
    self
      .events()
      .into_iter()
      .filter_map(|e| match e {
        Event::Error { message, .. } => Some(message),
        _ => None,
      })
      .collect()
  }

  fn push(&self, event: Event) -> NotificationId {
    self.events.lock().unwrap().push(event);
    NotificationId(self.next_id.fetch_add(1, Ordering::SeqCst))
  }
}

impl MessageHandler for RecordingHandler {
  fn info(&self, message: &str, detail: Option<&str>) -> NotificationId {
    self.push(Event::info(message, detail))
  }

  fn error(&self, message: &str, detail: Option<&str>) -> NotificationId {
    self.push(Event::error(message, detail))
  }

  fn success(&self, message: &str, detail: Option<&str>) -> NotificationId {
    self.push(Event::success(message, detail))
  }

  fn credentials_missing(&self, notification: NotificationId) {
    self.push(Event::CredentialsMissing(notification));
  }

  fn dismiss(&self, notification: NotificationId) {
    self.push(Event::Dismissed(notification));
  }

  fn service_dormant(&self, message: &str) -> Remediation {
    self.push(Event::Dormant(message.to_string()));
    self
      .remediations
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or(Remediation::Dismiss)
  }
}

#[derive(Default)]
pub struct RecordingLint {
  statuses: Mutex<Vec<BuildStatus>>,
}

impl RecordingLint {
  pub fn count(&self) -> usize {
    self.statuses.lock().unwrap().len()
  }
}

impl LintHandler for RecordingLint {
  fn lint(&self, status: &BuildStatus) {
    self.statuses.lock().unwrap().push(status.clone());
  }
}

#[derive(Default)]
pub struct RecordingUrls {
  urls: Mutex<Vec<String>>,
}

impl RecordingUrls {
  pub fn opened(&self) -> Vec<String> {
    self.urls.lock().unwrap().clone()
  }
}

impl UrlOpener for RecordingUrls {
  fn open_url(&self, url: &str) {
    self.urls.lock().unwrap().push(url.to_string());
  }
}

#[derive(Default)]
pub struct RecordingClipboard {
  texts: Mutex<Vec<String>>,
}

impl RecordingClipboard {
  pub fn texts(&self) -> Vec<String> {
    self.texts.lock().unwrap().clone()
  }
}

impl Clipboard for RecordingClipboard {
  fn write_text(&self, text: &str) {
    self.texts.lock().unwrap().push(text.to_string());
  }
}
