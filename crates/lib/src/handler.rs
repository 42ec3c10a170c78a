//! Collaborator traits through which the engine reaches its host.
//!
//! The engine never talks to a terminal or window directly. Progress,
//! diagnostics, URL opening and clipboard access all go through these traits,
//! so a CLI, an editor integration, or a test recorder can plug in.

use serde::Serialize;

use crate::types::{BuildMessage, BuildStatus};

/// Handle for a notification the host displayed, used to dismiss it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NotificationId(pub u64);

/// What to do about a dormant service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remediation {
  /// Open the cloud dashboard so the user can inspect the service.
  OpenDashboard,
  /// Start the service, wait for it, then replay the failed operation once.
  StartAndRetry,
  /// Give up with the original error.
  Dismiss,
}

/// Receives user-facing messages.
pub trait MessageHandler {
  fn info(&self, message: &str, detail: Option<&str>) -> NotificationId;

  fn error(&self, message: &str, detail: Option<&str>) -> NotificationId;

  fn success(&self, message: &str, detail: Option<&str>) -> NotificationId;

  /// Credentials could not be resolved; `notification` is the error already shown.
  fn credentials_missing(&self, notification: NotificationId);

  fn dismiss(&self, notification: NotificationId);

  /// Render build output for display.
  fn loggable_message(&self, messages: &[BuildMessage]) -> String {
    messages
      .iter()
      .map(|m| m.message_text.as_str())
      .collect::<Vec<_>>()
      .join("\n")
  }

  /// The service is stopped; ask how to proceed.
  fn service_dormant(&self, message: &str) -> Remediation;
}

/// Receives the full build status once a build ends, for diagnostics.
pub trait LintHandler {
  fn lint(&self, status: &BuildStatus);
}

/// Opens URLs for the user.
pub trait UrlOpener {
  fn open_url(&self, url: &str);
}

/// Places text on the system clipboard.
pub trait Clipboard {
  fn write_text(&self, text: &str);
}

/// Collaborator that does nothing, for hosts without a given capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ignore;

impl LintHandler for Ignore {
  fn lint(&self, _status: &BuildStatus) {}
}

impl UrlOpener for Ignore {
  fn open_url(&self, _url: &str) {}
}

impl Clipboard for Ignore {
  fn write_text(&self, _text: &str) {}
}
