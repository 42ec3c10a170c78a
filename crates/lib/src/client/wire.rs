//! Wire formats of the build service endpoints.
//!
//! Every endpoint decodes into a permissive body type first; the `validate`
//! step turns it into a domain value or a decode error naming the missing field.

use serde::Deserialize;
use serde_json::Value;

use super::types::{ClientError, SubmittedBuild};
use crate::types::{Artifact, BuildMessage, BuildState, BuildStatus, JobHandle, ServiceInfo, ServiceState};

/// Joined messages of a structured `errors` array, if the body carries one.
pub(crate) fn service_errors(body: &Value) -> Option<String> {
  let errors = body.get("errors")?.as_array()?;
  if errors.is_empty() {
    return None;
  }
  let messages: Vec<String> = errors
    .iter()
    .map(|e| match e.get("message").and_then(Value::as_str) {
      Some(message) => message.to_string(),
      None => e.to_string(),
    })
    .collect();
  Some(messages.join("\n"))
}

fn required(url: &str, field: &str, value: Option<String>) -> Result<String, ClientError> {
  value
    .filter(|v| !v.is_empty())
    .ok_or_else(|| ClientError::decode(url, format!("missing field `{}`", field)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenBody {
  access_token: Option<String>,
}

impl TokenBody {
  pub(crate) fn validate(self, url: &str) -> Result<String, ClientError> {
    required(url, "access_token", self.access_token)
  }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitBody {
  id: Option<String>,
  output_id: Option<String>,
}

impl SubmitBody {
  pub(crate) fn validate(self, url: &str) -> Result<SubmittedBuild, ClientError> {
    Ok(SubmittedBuild {
      id: required(url, "id", self.id)?,
      output_id: required(url, "output_id", self.output_id)?,
    })
  }
}

#[derive(Debug, Deserialize)]
struct OutputEntry {
  #[serde(default)]
  message_text: String,
}

#[derive(Debug, Deserialize)]
struct ArtifactEntry {
  id: Option<String>,
  name: Option<String>,
  download: Option<String>,
  submit_job: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusBody {
  status: Option<String>,
  #[serde(default)]
  output: Vec<OutputEntry>,
  #[serde(default)]
  artifacts: Vec<ArtifactEntry>,
}

impl StatusBody {
  pub(crate) fn validate(self, url: &str) -> Result<BuildStatus, ClientError> {
    let raw = required(url, "status", self.status)?;
    let status =
      BuildState::parse(&raw).ok_or_else(|| ClientError::decode(url, format!("unknown build status '{}'", raw)))?;

    let output = self
      .output
      .into_iter()
      .map(|entry| BuildMessage::new(entry.message_text))
      .collect();

    // Artifacts are only meaningful once the build has succeeded.
    let artifacts = if status == BuildState::Built {
      self
        .artifacts
        .into_iter()
        .map(|a| {
          Ok(Artifact {
            id: required(url, "artifacts[].id", a.id)?,
            name: required(url, "artifacts[].name", a.name)?,
            download_url: required(url, "artifacts[].download", a.download)?,
            submit_job_url: a.submit_job.unwrap_or_default(),
          })
        })
        .collect::<Result<Vec<_>, ClientError>>()?
    } else {
      Vec::new()
    };

    Ok(BuildStatus::new(status, output).with_artifacts(artifacts))
  }
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobBody {
  id: Option<Value>,
  name: Option<String>,
  health: Option<String>,
}

impl JobBody {
  pub(crate) fn validate(self, url: &str) -> Result<JobHandle, ClientError> {
    let id = match self.id {
      Some(Value::String(s)) => s,
      Some(Value::Number(n)) => n.to_string(),
      _ => String::new(),
    };
    Ok(JobHandle {
      id,
      name: required(url, "name", self.name)?,
      health: self.health.unwrap_or_else(|| "unknown".to_string()),
    })
  }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceBody {
  id: Option<String>,
  state: Option<String>,
  streams_console: Option<String>,
}

impl ServiceBody {
  pub(crate) fn validate(self) -> ServiceInfo {
    ServiceInfo {
      id: self.id,
      state: self.state.as_deref().map(ServiceState::parse),
      streams_console: self.streams_console,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn status(body: Value) -> Result<BuildStatus, ClientError> {
    serde_json::from_value::<StatusBody>(body).unwrap().validate("http://x")
  }

  #[test]
  fn errors_are_joined() {
    let body = json!({"errors": [{"code": "CDISB4090E", "message": "CDISB4090E service stopped"}, {"message": "second"}]});
    assert_eq!(service_errors(&body).unwrap(), "CDISB4090E service stopped\nsecond");
  }

  #[test]
  fn no_errors_key() {
    assert!(service_errors(&json!({"id": "b1"})).is_none());
    assert!(service_errors(&json!({"errors": []})).is_none());
  }

  #[test]
  fn status_with_output() {
    let s = status(json!({"status": "building", "output": [{"message_text": "m1"}]})).unwrap();
    assert_eq!(s.status, BuildState::Building);
    assert_eq!(s.output, vec![BuildMessage::new("m1")]);
    assert!(s.artifacts.is_empty());
  }

  #[test]
  fn artifacts_only_when_built() {
    let artifacts = json!([{"id": "a1", "name": "sample.Main.sab", "download": "http://x/a1", "submit_job": "http://x/jobs"}]);
    let building = status(json!({"status": "building", "artifacts": artifacts.clone()})).unwrap();
    assert!(building.artifacts.is_empty());

    let built = status(json!({"status": "built", "artifacts": artifacts})).unwrap();
    assert_eq!(built.artifacts.len(), 1);
    assert_eq!(built.artifacts[0].download_url, "http://x/a1");
  }

  #[test]
  fn unknown_status_is_decode_error() {
    assert!(matches!(status(json!({"status": "queued"})), Err(ClientError::Decode { .. })));
    assert!(matches!(status(json!({})), Err(ClientError::Decode { .. })));
  }

  #[test]
  fn job_defaults() {
    let body: JobBody = serde_json::from_value(json!({"id": 7, "name": "job_1"})).unwrap();
    let job = body.validate("http://x").unwrap();
    assert_eq!(job.id, "7");
    assert_eq!(job.health, "unknown");
  }
}
