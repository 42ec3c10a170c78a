//! Source inspection.
//!
//! Finds the namespace and main composites declared in a source file and the
//! application directory a file belongs to.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::consts::{APP_DESCRIPTOR, MAKEFILE_NAME, TOOLKIT_DESCRIPTOR};

static NAMESPACE_REGEX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?m)^\s*namespace\s+([A-Za-z0-9._]+)\s*;").expect("valid namespace regex"));

// `composite Name {`, with comments allowed around the name. Composites with
// ports or parameters have `(` before the brace and never match.
static MAIN_COMPOSITE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\bcomposite\b(?:\s|//[^\n]*|/\*(?s:.*?)\*/)+([A-Za-z0-9._]+)(?:\s|//[^\n]*|/\*(?s:.*?)\*/)*\{")
    .expect("valid composite regex")
});

#[derive(Debug, Error)]
pub enum SplError {
  #[error("failed to read source file '{path}': {source}")]
  ReadFile {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Declarations found in a source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
  /// First declared namespace.
  pub namespace: Option<String>,
  /// Main composites in declaration order.
  pub main_composites: Vec<String>,
}

impl SourceInfo {
  /// Fully-qualified name of the main composite, when there is exactly one.
  pub fn fqn(&self) -> Option<String> {
    match self.main_composites.as_slice() {
      [composite] => Some(qualify(self.namespace.as_deref(), composite)),
      _ => None,
    }
  }

  /// Fully-qualified names of every main composite.
  pub fn fqns(&self) -> Vec<String> {
    self
      .main_composites
      .iter()
      .map(|c| qualify(self.namespace.as_deref(), c))
      .collect()
  }
}

/// `ns::Name`, or just `Name` in the default namespace.
pub fn qualify(namespace: Option<&str>, composite: &str) -> String {
  match namespace {
    Some(ns) if !ns.is_empty() => format!("{}::{}", ns, composite),
    _ => composite.to_string(),
  }
}

pub fn inspect_source(contents: &str) -> SourceInfo {
  let namespace = NAMESPACE_REGEX
    .captures(contents)
    .and_then(|c| c.get(1))
    .map(|m| m.as_str().to_string());
  let main_composites = MAIN_COMPOSITE_REGEX
    .captures_iter(contents)
    .filter_map(|c| c.get(1))
    .map(|m| m.as_str().to_string())
    .collect();

  SourceInfo {
    namespace,
    main_composites,
  }
}

pub fn inspect_file(path: &Path) -> Result<SourceInfo, SplError> {
  let contents = std::fs::read_to_string(path).map_err(|source| SplError::ReadFile {
    path: path.to_path_buf(),
    source,
  })?;
  let info = inspect_source(&contents);
  debug!(path = %path.display(), namespace = ?info.namespace, composites = ?info.main_composites, "inspected source");
  Ok(info)
}

fn is_app_dir(dir: &Path) -> bool {
  [APP_DESCRIPTOR, TOOLKIT_DESCRIPTOR, MAKEFILE_NAME, "makefile"]
    .iter()
    .any(|marker| dir.join(marker).is_file())
}

/// Find the application directory containing `file`.
///
/// Walks up from the file's directory to the first directory holding an
/// application descriptor, toolkit descriptor or build file. Reaching one of
/// `workspace_roots` ends the walk at that root. Returns `None` when neither
/// happens before the filesystem root.
pub fn find_app_root(file: &Path, workspace_roots: &[PathBuf]) -> Option<PathBuf> {
  let start = if file.is_dir() { file } else { file.parent()? };

  for dir in start.ancestors() {
    if is_app_dir(dir) {
      return Some(dir.to_path_buf());
    }
    if workspace_roots.iter().any(|root| root == dir) {
      return Some(dir.to_path_buf());
    }
  }
  None
}
