//! Compiler diagnostics from build output.
//!
//! The build service relays compiler messages of the form
//! `[timestamp ]path:line:col: CODE SEVERITY: text`, for example
//! `sample/Main.spl:4:5: CDISP0053E ERROR: Unknown identifier: x.`

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::types::{BuildMessage, BuildStatus};

static MESSAGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^(?:[0-9][\w\-:.]+\s*)?([\w.]+(?:/[\w.]+)?):(\d+):(\d+):\s+(\w{5}\d{4}[IWE])\s+((ERROR|WARN|INFO):.*)$")
    .expect("valid diagnostic regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Error,
  Warning,
  Info,
}

impl Severity {
  fn parse(value: &str) -> Option<Self> {
    match value {
      "ERROR" => Some(Severity::Error),
      "WARN" => Some(Severity::Warning),
      "INFO" => Some(Severity::Info),
      _ => None,
    }
  }
}

impl std::fmt::Display for Severity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Severity::Error => f.write_str("error"),
      Severity::Warning => f.write_str("warning"),
      Severity::Info => f.write_str("info"),
    }
  }
}

/// A compiler message attached to a source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
  /// Source file, joined onto the application root when one is given.
  pub file: PathBuf,
  /// 1-based line.
  pub line: u32,
  /// 1-based column.
  pub column: u32,
  pub code: String,
  pub severity: Severity,
  /// Message text starting with the severity keyword, e.g. `ERROR: ...`.
  pub message: String,
}

impl std::fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{}:{}:{}: {} {}",
      self.file.display(),
      self.line,
      self.column,
      self.code,
      self.message
    )
  }
}

/// Parse a single output line.
pub fn parse_message(text: &str, app_root: Option<&Path>) -> Option<Diagnostic> {
  let captures = MESSAGE_REGEX.captures(text.trim_end())?;
  let relative = captures.get(1)?.as_str();
  let file = match app_root {
    Some(root) => root.join(relative),
    None => PathBuf::from(relative),
  };

  Some(Diagnostic {
    file,
    line: captures.get(2)?.as_str().parse().ok()?,
    column: captures.get(3)?.as_str().parse().ok()?,
    code: captures.get(4)?.as_str().to_string(),
    severity: Severity::parse(captures.get(6)?.as_str())?,
    message: captures.get(5)?.as_str().to_string(),
  })
}

/// Diagnostics found in build output, in output order.
pub fn parse_diagnostics(messages: &[BuildMessage], app_root: Option<&Path>) -> Vec<Diagnostic> {
  messages
    .iter()
    .filter_map(|m| parse_message(&m.message_text, app_root))
    .collect()
}

/// Diagnostics for a finished build.
pub fn diagnostics_for(status: &BuildStatus, app_root: Option<&Path>) -> Vec<Diagnostic> {
  parse_diagnostics(&status.output, app_root)
}
