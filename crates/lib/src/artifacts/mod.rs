//! Artifact download and job submission.
//!
//! Requests for all artifacts of a build run concurrently and are joined
//! fail-fast: one failure rejects the whole batch. Downloads are held in
//! memory until every request has succeeded, so a rejected batch writes
//! nothing.

use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::client::{BuildClient, ClientError};
use crate::consts::OUTPUT_DIR_NAME;
use crate::credentials::Session;
use crate::types::{Artifact, JobHandle};

#[derive(Debug, Error)]
pub enum ArtifactError {
  /// One request of the batch failed; the batch is abandoned.
  #[error("artifact '{artifact}' failed: {source}")]
  Batch {
    artifact: String,
    #[source]
    source: ClientError,
  },

  /// The artifact name cannot be used as a file name.
  #[error("artifact name '{0}' is not a valid file name")]
  InvalidName(String),

  #[error("failed to write '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Files written by [`download_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
  pub output_dir: PathBuf,
  pub files: Vec<PathBuf>,
}

/// `output/` next to the source archive.
pub fn default_output_dir(archive: &Path) -> PathBuf {
  archive
    .parent()
    .unwrap_or_else(|| Path::new("."))
    .join(OUTPUT_DIR_NAME)
}

fn file_name_for(artifact: &Artifact) -> Result<&str, ArtifactError> {
  Path::new(&artifact.name)
    .file_name()
    .and_then(|n| n.to_str())
    .filter(|n| *n == artifact.name)
    .ok_or_else(|| ArtifactError::InvalidName(artifact.name.clone()))
}

/// Download every artifact and write it to `output_dir/{name}`.
///
/// The directory is created only after all downloads succeed. Existing files
/// with the same name are replaced.
pub async fn download_all<C: BuildClient>(
  client: &C,
  session: &Session,
  artifacts: &[Artifact],
  output_dir: &Path,
) -> Result<DownloadReport, ArtifactError> {
  for artifact in artifacts {
    file_name_for(artifact)?;
  }

  info!(count = artifacts.len(), "downloading artifacts");
  let payloads = try_join_all(artifacts.iter().map(|artifact| async move {
    client
      .download_artifact(session, artifact)
      .await
      .map_err(|source| ArtifactError::Batch {
        artifact: artifact.name.clone(),
        source,
      })
  }))
  .await?;

  fs::create_dir_all(output_dir)
    .await
    .map_err(|source| ArtifactError::Write {
      path: output_dir.to_path_buf(),
      source,
    })?;

  let mut files = Vec::with_capacity(artifacts.len());
  for (artifact, bytes) in artifacts.iter().zip(payloads) {
    let path = output_dir.join(file_name_for(artifact)?);
    let write_err = |source| ArtifactError::Write {
      path: path.clone(),
      source,
    };
    if fs::try_exists(&path).await.map_err(write_err)? {
      fs::remove_file(&path).await.map_err(write_err)?;
    }
    fs::write(&path, &bytes).await.map_err(write_err)?;
    debug!(path = %path.display(), size = bytes.len(), "artifact written");
    files.push(path);
  }

  Ok(DownloadReport {
    output_dir: output_dir.to_path_buf(),
    files,
  })
}

/// Start one job per artifact with the same job configuration.
pub async fn submit_all<C: BuildClient>(
  client: &C,
  session: &Session,
  artifacts: &[Artifact],
  job_config: &Value,
) -> Result<Vec<JobHandle>, ArtifactError> {
  info!(count = artifacts.len(), "submitting jobs");
  try_join_all(artifacts.iter().map(|artifact| async move {
    client
      .submit_job(session, artifact, job_config)
      .await
      .map_err(|source| ArtifactError::Batch {
        artifact: artifact.name.clone(),
        source,
      })
  }))
  .await
}
