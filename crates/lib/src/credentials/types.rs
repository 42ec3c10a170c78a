//! Credential, token and session types.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Errors resolving service credentials.
#[derive(Debug, Error)]
pub enum CredentialsError {
  /// Neither explicit credentials nor a credentials document were provided.
  #[error("no service credentials found; pass credentials JSON or set VCAP_SERVICES")]
  Missing,

  /// Explicit credentials could not be parsed or lack required fields.
  #[error("invalid service credentials: {0}")]
  Invalid(String),

  /// The credentials document could not be read.
  #[error("failed to read credentials document '{path}': {source}")]
  ReadDocument {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The credentials document is malformed or holds no usable entry.
  #[error("invalid credentials document '{path}': {message}")]
  Document { path: PathBuf, message: String },
}

/// Credentials for one service instance.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ServiceCredentials {
  #[serde(skip_serializing)]
  pub api_key: String,

  #[serde(rename = "restUrl")]
  pub rest_url: String,
}

impl ServiceCredentials {
  pub fn new(api_key: impl Into<String>, rest_url: impl Into<String>) -> Self {
    Self {
      api_key: api_key.into(),
      rest_url: rest_url.into(),
    }
  }

  /// REST root without a trailing slash.
  pub fn rest_root(&self) -> &str {
    self.rest_url.trim_end_matches('/')
  }
}

impl std::fmt::Debug for ServiceCredentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ServiceCredentials")
      .field("api_key", &"<redacted>")
      .field("rest_url", &self.rest_url)
      .finish()
  }
}

/// Bearer token obtained from the identity service.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
  pub fn new(value: impl Into<String>) -> Self {
    Self(value.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Debug for AccessToken {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str("AccessToken(<redacted>)")
  }
}

/// Per-operation context passed to every client call.
#[derive(Debug, Clone)]
pub struct Session {
  pub credentials: ServiceCredentials,
  pub token: AccessToken,
}

impl Session {
  pub fn new(credentials: ServiceCredentials, token: AccessToken) -> Self {
    Self { credentials, token }
  }

  pub fn rest_root(&self) -> &str {
    self.credentials.rest_root()
  }
}
