//! Build service client.
//!
//! [`BuildClient`] lists the remote operations the engine needs; each is a
//! single authenticated round trip carrying no state between calls.
//! [`HttpBuildClient`] implements it over `reqwest`.

mod types;
mod wire;

pub use types::*;
pub(crate) use wire::TokenBody;

use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::{Response, header};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::credentials::{AccessToken, Session};
use crate::types::{Artifact, BuildRequest, BuildStatus, JobHandle, ServiceInfo, ServiceState};

/// Operations of the remote build service.
#[allow(async_fn_in_trait)]
pub trait BuildClient {
  /// Exchange an API key for a bearer token.
  async fn exchange_token(&self, api_key: &str) -> Result<AccessToken, ClientError>;

  /// Upload a source archive for building.
  async fn submit_source(&self, session: &Session, archive: &Path, originator: &str)
  -> Result<SubmittedBuild, ClientError>;

  /// Query the current status and output of a build.
  async fn get_status(&self, session: &Session, build: &BuildRequest) -> Result<BuildStatus, ClientError>;

  /// Fetch the binary payload of an artifact.
  async fn download_artifact(&self, session: &Session, artifact: &Artifact) -> Result<Vec<u8>, ClientError>;

  /// Start a job from a built artifact.
  async fn submit_job(&self, session: &Session, artifact: &Artifact, job_config: &Value)
  -> Result<JobHandle, ClientError>;

  /// Start a job from a bundle file on disk.
  async fn submit_bundle(&self, session: &Session, bundle: &Path, job_config: &Value)
  -> Result<JobHandle, ClientError>;

  /// Request a state change of the service instance.
  async fn patch_service_state(&self, session: &Session, desired: ServiceState) -> Result<ServiceInfo, ClientError>;

  /// Fetch instance information, including its state and console location.
  async fn get_service_info(&self, session: &Session) -> Result<ServiceInfo, ClientError>;
}

/// [`BuildClient`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBuildClient {
  http: reqwest::Client,
  token_url: String,
}

impl HttpBuildClient {
  pub fn new(config: &EngineConfig) -> Result<Self, ClientError> {
    let mut builder = reqwest::Client::builder().user_agent(concat!("streamsub/", env!("CARGO_PKG_VERSION")));
    if let Some(timeout) = config.request_timeout {
      builder = builder.timeout(timeout);
    }
    let http = builder.build().map_err(ClientError::Setup)?;
    Ok(Self {
      http,
      token_url: config.token_url.clone(),
    })
  }

  fn network(url: &str) -> impl FnOnce(reqwest::Error) -> ClientError + '_ {
    move |source| ClientError::Network {
      url: url.to_string(),
      source,
    }
  }
}

/// Decode a JSON response, surfacing structured service errors first.
pub(crate) async fn read_json<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ClientError> {
  let status = response.status();
  let body = response.text().await.map_err(HttpBuildClient::network(url))?;
  let value: Option<Value> = serde_json::from_str(&body).ok();

  if let Some(value) = &value
    && let Some(message) = wire::service_errors(value)
  {
    return Err(ClientError::Service {
      status: Some(status.as_u16()),
      message,
    });
  }

  if !status.is_success() {
    return Err(ClientError::Status {
      url: url.to_string(),
      status: status.as_u16(),
      body,
    });
  }

  let value = value.ok_or_else(|| ClientError::decode(url, "response body is not JSON"))?;
  serde_json::from_value(value).map_err(|e| ClientError::decode(url, e.to_string()))
}

/// Read a binary response, surfacing structured service errors on failure.
async fn read_bytes(url: &str, response: Response) -> Result<Vec<u8>, ClientError> {
  let status = response.status();
  let bytes = response.bytes().await.map_err(HttpBuildClient::network(url))?;

  if !status.is_success() {
    if let Ok(value) = serde_json::from_slice::<Value>(&bytes)
      && let Some(message) = wire::service_errors(&value)
    {
      return Err(ClientError::Service {
        status: Some(status.as_u16()),
        message,
      });
    }
    return Err(ClientError::Status {
      url: url.to_string(),
      status: status.as_u16(),
      body: String::from_utf8_lossy(&bytes).to_string(),
    });
  }

  Ok(bytes.to_vec())
}

async fn file_part(path: &Path, mime: &str) -> Result<Part, ClientError> {
  let read_err = |source| ClientError::ReadFile {
    path: path.to_path_buf(),
    source,
  };
  let file = tokio::fs::File::open(path).await.map_err(read_err)?;
  let length = file.metadata().await.map_err(read_err)?.len();
  let file_name = path
    .file_name()
    .map(|n| n.to_string_lossy().to_string())
    .unwrap_or_default();

  Part::stream_with_length(reqwest::Body::from(file), length)
    .file_name(file_name)
    .mime_str(mime)
    .map_err(ClientError::Setup)
}

fn job_options_part(job_config: &Value) -> Result<Part, ClientError> {
  Part::text(job_config.to_string())
    .mime_str("application/json")
    .map_err(ClientError::Setup)
}

impl BuildClient for HttpBuildClient {
  async fn exchange_token(&self, api_key: &str) -> Result<AccessToken, ClientError> {
    crate::credentials::exchange_token(&self.http, &self.token_url, api_key).await
  }

  async fn submit_source(
    &self,
    session: &Session,
    archive: &Path,
    originator: &str,
  ) -> Result<SubmittedBuild, ClientError> {
    let url = format!("{}/builds", session.rest_root());
    info!(url = %url, archive = %archive.display(), "submitting source archive");

    let form = Form::new().part("file", file_part(archive, "application/zip").await?);
    let response = self
      .http
      .post(&url)
      .query(&[("originator", originator)])
      .bearer_auth(session.token.as_str())
      .header(header::ACCEPT, "application/json")
      .multipart(form)
      .send()
      .await
      .map_err(Self::network(&url))?;

    let body: wire::SubmitBody = read_json(&url, response).await?;
    let submitted = body.validate(&url)?;
    debug!(id = %submitted.id, output_id = %submitted.output_id, "build submitted");
    Ok(submitted)
  }

  async fn get_status(&self, session: &Session, build: &BuildRequest) -> Result<BuildStatus, ClientError> {
    let url = format!("{}/builds/{}", session.rest_root(), build.id);
    let response = self
      .http
      .get(&url)
      .query(&[("output_id", build.output_id.as_str())])
      .bearer_auth(session.token.as_str())
      .header(header::ACCEPT, "application/json")
      .send()
      .await
      .map_err(Self::network(&url))?;

    let body: wire::StatusBody = read_json(&url, response).await?;
    let status = body.validate(&url)?;
    debug!(id = %build.id, status = %status.status, output = status.output.len(), "build status");
    Ok(status)
  }

  async fn download_artifact(&self, session: &Session, artifact: &Artifact) -> Result<Vec<u8>, ClientError> {
    let url = artifact.download_url.as_str();
    info!(url = %url, artifact = %artifact.name, "downloading artifact");

    let response = self
      .http
      .get(url)
      .bearer_auth(session.token.as_str())
      .header(header::ACCEPT, "application/octet-stream")
      .send()
      .await
      .map_err(Self::network(url))?;

    let bytes = read_bytes(url, response).await?;
    debug!(artifact = %artifact.name, size = bytes.len(), "artifact downloaded");
    Ok(bytes)
  }

  async fn submit_job(
    &self,
    session: &Session,
    artifact: &Artifact,
    job_config: &Value,
  ) -> Result<JobHandle, ClientError> {
    let url = artifact.submit_job_url.as_str();
    if url.is_empty() {
      return Err(ClientError::decode(
        &artifact.download_url,
        format!("artifact '{}' has no job submission link", artifact.name),
      ));
    }
    info!(url = %url, artifact = %artifact.name, "submitting job from artifact");

    let form = Form::new().part("job_options", job_options_part(job_config)?);
    let response = self
      .http
      .post(url)
      .query(&[("artifact_id", artifact.id.as_str())])
      .bearer_auth(session.token.as_str())
      .multipart(form)
      .send()
      .await
      .map_err(Self::network(url))?;

    let body: wire::JobBody = read_json(url, response).await?;
    body.validate(url)
  }

  async fn submit_bundle(&self, session: &Session, bundle: &Path, job_config: &Value) -> Result<JobHandle, ClientError> {
    let url = format!("{}/jobs", session.rest_root());
    info!(url = %url, bundle = %bundle.display(), "submitting bundle");

    let form = Form::new()
      .part("job_options", job_options_part(job_config)?)
      .part("bundle_file", file_part(bundle, "application/octet-stream").await?);
    let response = self
      .http
      .post(&url)
      .bearer_auth(session.token.as_str())
      .multipart(form)
      .send()
      .await
      .map_err(Self::network(&url))?;

    let body: wire::JobBody = read_json(&url, response).await?;
    body.validate(&url)
  }

  async fn patch_service_state(&self, session: &Session, desired: ServiceState) -> Result<ServiceInfo, ClientError> {
    let url = session.rest_root().to_string();
    info!(url = %url, state = %desired, "requesting service state change");

    let response = self
      .http
      .patch(&url)
      .bearer_auth(session.token.as_str())
      .json(&json!({ "state": desired.as_str() }))
      .send()
      .await
      .map_err(Self::network(&url))?;

    let body: wire::ServiceBody = read_json(&url, response).await?;
    Ok(body.validate())
  }

  async fn get_service_info(&self, session: &Session) -> Result<ServiceInfo, ClientError> {
    let url = session.rest_root().to_string();
    let response = self
      .http
      .get(&url)
      .bearer_auth(session.token.as_str())
      .header(header::ACCEPT, "application/json")
      .send()
      .await
      .map_err(Self::network(&url))?;

    let body: wire::ServiceBody = read_json(&url, response).await?;
    let info = body.validate();
    debug!(state = ?info.state, "service info");
    Ok(info)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::credentials::ServiceCredentials;
  use crate::types::{BuildState, BuildTarget};
  use mockito::Matcher;
  use tempfile::TempDir;

  fn client(server: &mockito::ServerGuard) -> HttpBuildClient {
    let config = EngineConfig {
      token_url: format!("{}/identity/token", server.url()),
      ..EngineConfig::default()
    };
    HttpBuildClient::new(&config).unwrap()
  }

  fn session(server: &mockito::ServerGuard) -> Session {
    Session::new(
      ServiceCredentials::new("k1", format!("{}/v2/instances/i1", server.url())),
      AccessToken::new("tok"),
    )
  }

  fn request() -> BuildRequest {
    BuildRequest {
      id: "b1".to_string(),
      output_id: "o1".to_string(),
      target: BuildTarget::Composite("sample::Main".to_string()),
      originator: "streamsub-0.1.0:cli".to_string(),
    }
  }

  #[tokio::test]
  async fn submit_source_posts_multipart() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/v2/instances/i1/builds")
      .match_query(Matcher::UrlEncoded("originator".into(), "streamsub-0.1.0:cli".into()))
      .match_header("authorization", "Bearer tok")
      .match_header("content-type", Matcher::Regex("multipart/form-data".into()))
      .match_body(Matcher::Regex("name=\"file\"".into()))
      .with_body(r#"{"id":"b1","output_id":"o1"}"#)
      .create_async()
      .await;

    let temp = TempDir::new().unwrap();
    let archive = temp.path().join(".build_sample.Main_1.zip");
    std::fs::write(&archive, b"PK").unwrap();

    let submitted = client(&server)
      .submit_source(&session(&server), &archive, "streamsub-0.1.0:cli")
      .await
      .unwrap();

    mock.assert_async().await;
    assert_eq!(submitted.id, "b1");
    assert_eq!(submitted.output_id, "o1");
  }

  #[tokio::test]
  async fn errors_array_becomes_service_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("GET", "/v2/instances/i1/builds/b1")
      .match_query(Matcher::UrlEncoded("output_id".into(), "o1".into()))
      .with_status(200)
      .with_body(r#"{"errors":[{"message":"CDISB4090E The service is not running."}]}"#)
      .create_async()
      .await;

    let err = client(&server)
      .get_status(&session(&server), &request())
      .await
      .unwrap_err();
    assert_eq!(err.service_message(), Some("CDISB4090E The service is not running."));
  }

  #[tokio::test]
  async fn non_success_without_errors_is_status_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("GET", "/v2/instances/i1/builds/b1")
      .match_query(Matcher::Any)
      .with_status(502)
      .with_body("bad gateway")
      .create_async()
      .await;

    let err = client(&server)
      .get_status(&session(&server), &request())
      .await
      .unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 502, .. }));
  }

  #[tokio::test]
  async fn get_status_decodes_artifacts() {
    let mut server = mockito::Server::new_async().await;
    let body = json!({
      "status": "built",
      "output": [{"message_text": "done"}],
      "artifacts": [{"id": "a1", "name": "sample.Main.sab", "download": "http://x/a1", "submit_job": "http://x/jobs"}]
    });
    let _mock = server
      .mock("GET", "/v2/instances/i1/builds/b1")
      .match_query(Matcher::Any)
      .with_body(body.to_string())
      .create_async()
      .await;

    let status = client(&server)
      .get_status(&session(&server), &request())
      .await
      .unwrap();
    assert_eq!(status.status, BuildState::Built);
    assert_eq!(status.artifacts[0].name, "sample.Main.sab");
  }

  #[tokio::test]
  async fn download_404_is_status_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server.mock("GET", "/artifacts/a1").with_status(404).create_async().await;

    let artifact = Artifact {
      id: "a1".to_string(),
      name: "a.sab".to_string(),
      download_url: format!("{}/artifacts/a1", server.url()),
      submit_job_url: String::new(),
    };
    let err = client(&server)
      .download_artifact(&session(&server), &artifact)
      .await
      .unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 404, .. }));
  }

  #[tokio::test]
  async fn submit_job_sends_artifact_id() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/jobs")
      .match_query(Matcher::UrlEncoded("artifact_id".into(), "a1".into()))
      .match_body(Matcher::Regex("name=\"job_options\"".into()))
      .with_body(r#"{"id":"5","name":"sample::Main_5","health":"healthy"}"#)
      .create_async()
      .await;

    let artifact = Artifact {
      id: "a1".to_string(),
      name: "a.sab".to_string(),
      download_url: String::new(),
      submit_job_url: format!("{}/jobs", server.url()),
    };
    let job = client(&server)
      .submit_job(&session(&server), &artifact, &json!({}))
      .await
      .unwrap();

    mock.assert_async().await;
    assert_eq!(job.name, "sample::Main_5");
    assert_eq!(job.health, "healthy");
  }

  #[tokio::test]
  async fn patch_service_state_sends_started() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("PATCH", "/v2/instances/i1")
      .match_body(Matcher::Json(json!({"state": "STARTED"})))
      .with_body(r#"{"id":"i1","state":"STARTING"}"#)
      .create_async()
      .await;

    let info = client(&server)
      .patch_service_state(&session(&server), ServiceState::Started)
      .await
      .unwrap();

    mock.assert_async().await;
    assert_eq!(info.state, Some(ServiceState::Starting));
  }

  #[tokio::test]
  async fn service_info_console_url() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("GET", "/v2/instances/i1")
      .with_body(r#"{"id":"i1","state":"STARTED","streams_console":"https://console.example"}"#)
      .create_async()
      .await;

    let info = client(&server).get_service_info(&session(&server)).await.unwrap();
    assert!(info.is_started());
    assert_eq!(
      info.console_url().unwrap(),
      "https://console.example#application/dashboard/Application%20Dashboard?instance=i1"
    );
  }
}
