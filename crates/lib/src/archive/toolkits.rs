//! Toolkit discovery.
//!
//! A toolkit is a directory holding a `toolkit.xml` descriptor. Toolkit roots
//! are scanned one level deep.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use super::types::ArchiveError;
use crate::consts::TOOLKIT_DESCRIPTOR;

/// A toolkit found under one of the configured roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toolkit {
  /// Directory name, used as the archive path under `toolkits/`.
  pub name: String,
  pub path: PathBuf,
}

/// Split a toolkit path setting on `,` and `;`.
pub fn split_toolkit_roots(setting: &str) -> Vec<PathBuf> {
  setting
    .split([',', ';'])
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(PathBuf::from)
    .collect()
}

/// Find the toolkits directly under each root.
///
/// Roots that don't exist are skipped. Toolkits keep the order of their roots
/// and are sorted by name within a root.
pub fn discover_toolkits(roots: &[PathBuf]) -> Result<Vec<Toolkit>, ArchiveError> {
  let mut toolkits = Vec::new();

  for root in roots {
    if !root.is_dir() {
      warn!(root = %root.display(), "toolkit root does not exist, skipping");
      continue;
    }

    let mut found = toolkits_in(root)?;
    found.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(root = %root.display(), count = found.len(), "discovered toolkits");
    toolkits.extend(found);
  }

  Ok(toolkits)
}

fn toolkits_in(root: &Path) -> Result<Vec<Toolkit>, ArchiveError> {
  let entries = fs::read_dir(root).map_err(|source| ArchiveError::ReadDir {
    path: root.to_path_buf(),
    source,
  })?;

  let mut toolkits = Vec::new();
  for entry in entries {
    let entry = entry.map_err(|source| ArchiveError::ReadDir {
      path: root.to_path_buf(),
      source,
    })?;
    let path = entry.path();
    if path.is_dir() && path.join(TOOLKIT_DESCRIPTOR).is_file() {
      toolkits.push(Toolkit {
        name: entry.file_name().to_string_lossy().to_string(),
        path,
      });
    }
  }
  Ok(toolkits)
}
