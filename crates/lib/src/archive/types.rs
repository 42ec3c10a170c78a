//! Types for source archive assembly.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::types::BuildTarget;

/// Errors that can occur while assembling a source archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
  /// The application root does not exist or is not a directory.
  #[error("application root is not a directory: {0}")]
  AppRootNotFound(PathBuf),

  /// Failed to list a directory.
  #[error("failed to read directory '{path}': {source}")]
  ReadDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Failed to walk a directory tree.
  #[error("failed to walk '{path}': {message}")]
  Walk { path: PathBuf, message: String },

  /// Failed to remove a stale archive at the destination.
  #[error("failed to remove stale archive '{path}': {source}")]
  RemoveStale {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Failed to create the archive file.
  #[error("failed to create archive '{path}': {source}")]
  Create {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Failed to read a file being added to the archive.
  #[error("failed to add '{path}' to archive: {source}")]
  AddFile {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The zip stream reported an error.
  #[error("archive stream error: {0}")]
  Zip(#[from] zip::result::ZipError),

  /// Writing the finished archive failed.
  #[error("failed to write archive: {0}")]
  Write(#[from] std::io::Error),
}

/// Input to [`super::assemble`].
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
  /// Root directory of the application.
  pub app_root: PathBuf,

  /// Directories whose toolkit subdirectories are bundled into the archive.
  pub toolkit_roots: Vec<PathBuf>,

  /// What the build service should compile.
  pub target: BuildTarget,

  /// Where to write the archive. Defaults to a timestamped file in `app_root`.
  pub destination: Option<PathBuf>,
}

impl ArchiveRequest {
  pub fn new(app_root: impl Into<PathBuf>, target: BuildTarget) -> Self {
    Self {
      app_root: app_root.into(),
      toolkit_roots: Vec::new(),
      target,
      destination: None,
    }
  }

  pub fn with_toolkit_roots(mut self, roots: Vec<PathBuf>) -> Self {
    self.toolkit_roots = roots;
    self
  }

  pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
    self.destination = Some(destination.into());
    self
  }
}

/// A finished source archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceArchive {
  /// Path of the zip file.
  pub path: PathBuf,

  /// Entry names in the order they were written.
  pub entries: Vec<String>,

  /// Names of the toolkits bundled under `toolkits/`.
  pub toolkits: Vec<String>,
}

impl SourceArchive {
  /// Whether an entry with exactly this name was written.
  pub fn contains(&self, name: &str) -> bool {
    self.entries.iter().any(|entry| entry == name)
  }
}
