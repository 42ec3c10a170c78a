//! Client errors and response types.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Errors from a single round trip to the remote service.
#[derive(Debug, Error)]
pub enum ClientError {
  /// The HTTP client could not be constructed.
  #[error("failed to create HTTP client: {0}")]
  Setup(#[source] reqwest::Error),

  /// The request never produced a response.
  #[error("request to {url} failed: {source}")]
  Network {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  /// The service answered with a structured error list.
  #[error("{message}")]
  Service { status: Option<u16>, message: String },

  /// The service answered with a non-success status and no error list.
  #[error("request to {url} returned HTTP {status}: {body}")]
  Status { url: String, status: u16, body: String },

  /// The response body did not have the expected shape.
  #[error("unexpected response from {url}: {message}")]
  Decode { url: String, message: String },

  /// A file to upload could not be read.
  #[error("failed to read '{path}': {source}")]
  ReadFile {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl ClientError {
  pub(crate) fn decode(url: &str, message: impl Into<String>) -> Self {
    ClientError::Decode {
      url: url.to_string(),
      message: message.into(),
    }
  }

  /// Message text of a service error, if this is one.
  pub fn service_message(&self) -> Option<&str> {
    match self {
      ClientError::Service { message, .. } => Some(message),
      _ => None,
    }
  }
}

/// Identifiers the service assigns to an accepted source submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmittedBuild {
  pub id: String,
  pub output_id: String,
}
