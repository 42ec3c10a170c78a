//! Service credential resolution and token exchange.
//!
//! Credentials come from an explicit JSON value or from the document named by
//! `VCAP_SERVICES`. They are resolved again for every top-level operation and
//! never written anywhere.

mod types;

pub use types::*;

use std::path::{Path, PathBuf};

use reqwest::header;
use serde_json::Value;
use tracing::{debug, info};

use crate::client::{ClientError, read_json};
use crate::consts::{APIKEY_GRANT_TYPE, SERVICE_ARRAY_KEY, VCAP_SERVICES_ENV};

/// Resolve service credentials.
///
/// Explicit JSON wins when present; it is never silently replaced by the
/// environment document. Otherwise the document at `$VCAP_SERVICES` is read.
pub fn resolve_credentials(explicit_json: Option<&str>) -> Result<ServiceCredentials, CredentialsError> {
  if let Some(json) = explicit_json.map(str::trim).filter(|j| !j.is_empty()) {
    debug!("using explicit service credentials");
    return parse_credentials(json);
  }

  match std::env::var(VCAP_SERVICES_ENV) {
    Ok(path) if !path.trim().is_empty() => {
      let path = PathBuf::from(path.trim());
      info!(path = %path.display(), "reading credentials document");
      read_credentials_document(&path)
    }
    _ => Err(CredentialsError::Missing),
  }
}

/// Parse explicit credentials JSON.
pub fn parse_credentials(json: &str) -> Result<ServiceCredentials, CredentialsError> {
  let value: Value = serde_json::from_str(json).map_err(|e| CredentialsError::Invalid(e.to_string()))?;
  credentials_from_value(&value).ok_or_else(|| CredentialsError::Invalid("expected `apikey` and `restUrl`".to_string()))
}

/// Read a credentials document in either the flat or the nested service shape.
pub fn read_credentials_document(path: &Path) -> Result<ServiceCredentials, CredentialsError> {
  let content = std::fs::read_to_string(path).map_err(|source| CredentialsError::ReadDocument {
    path: path.to_path_buf(),
    source,
  })?;
  let value: Value = serde_json::from_str(&content).map_err(|e| CredentialsError::Document {
    path: path.to_path_buf(),
    message: e.to_string(),
  })?;

  if let Some(credentials) = credentials_from_value(&value) {
    return Ok(credentials);
  }

  let services = value
    .get(SERVICE_ARRAY_KEY)
    .and_then(Value::as_array)
    .ok_or_else(|| CredentialsError::Document {
      path: path.to_path_buf(),
      message: format!("no '{}' service found", SERVICE_ARRAY_KEY),
    })?;

  services
    .iter()
    .filter_map(|service| service.get("credentials"))
    .find_map(credentials_from_value)
    .ok_or_else(|| CredentialsError::Document {
      path: path.to_path_buf(),
      message: format!("no credentials found in '{}' service", SERVICE_ARRAY_KEY),
    })
}

/// Extract complete credentials from a flat JSON object.
///
/// `restUrl` and `v2_rest_url` are preferred over `rest_url`, which older
/// documents use for a retired API version.
fn credentials_from_value(value: &Value) -> Option<ServiceCredentials> {
  let field = |key: &str| value.get(key).and_then(Value::as_str).filter(|v| !v.is_empty());
  let api_key = field("apikey")?;
  let rest_url = field("restUrl").or_else(|| field("v2_rest_url")).or_else(|| field("rest_url"))?;
  Some(ServiceCredentials::new(api_key, rest_url))
}

/// Exchange an API key for a bearer token at `token_url`.
pub async fn exchange_token(http: &reqwest::Client, token_url: &str, api_key: &str) -> Result<AccessToken, ClientError> {
  info!(url = %token_url, "requesting access token");

  let response = http
    .post(token_url)
    .header(header::ACCEPT, "application/json")
    .form(&[("grant_type", APIKEY_GRANT_TYPE), ("apikey", api_key)])
    .send()
    .await
    .map_err(|source| ClientError::Network {
      url: token_url.to_string(),
      source,
    })?;

  let body: crate::client::TokenBody = read_json(token_url, response).await?;
  Ok(AccessToken::new(body.validate(token_url)?))
}
