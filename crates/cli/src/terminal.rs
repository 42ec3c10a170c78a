//! Terminal implementations of the engine's host collaborators.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use streamsub_lib::handler::{Clipboard, LintHandler, MessageHandler, NotificationId, Remediation, UrlOpener};
use streamsub_lib::lint::{self, Severity};
use streamsub_lib::types::BuildStatus;
use tracing::{debug, warn};

use crate::output::{OutputFormat, print_detail, print_error, print_info, print_stat, print_success, print_warning};
use crate::prompts::confirm;

/// Writes engine messages to the terminal and asks the user about dormant services.
pub struct Terminal {
  format: OutputFormat,
  auto_start: bool,
  app_root: Option<PathBuf>,
  next_id: AtomicU64,
}

impl Terminal {
  pub fn new(format: OutputFormat) -> Self {
    Self {
      format,
      auto_start: false,
      app_root: None,
      next_id: AtomicU64::new(0),
    }
  }

  /// Start a dormant service without asking.
  pub fn with_auto_start(mut self, auto_start: bool) -> Self {
    self.auto_start = auto_start;
    self
  }

  /// Directory diagnostics are resolved against.
  pub fn with_app_root(mut self, app_root: Option<PathBuf>) -> Self {
    self.app_root = app_root;
    self
  }

  fn id(&self) -> NotificationId {
    NotificationId(self.next_id.fetch_add(1, Ordering::SeqCst))
  }
}

impl MessageHandler for Terminal {
  fn info(&self, message: &str, detail: Option<&str>) -> NotificationId {
    print_info(self.format, message);
    if let Some(detail) = detail {
      print_detail(self.format, detail);
    }
    self.id()
  }

  fn error(&self, message: &str, detail: Option<&str>) -> NotificationId {
    print_error(message);
    if let Some(detail) = detail {
      for line in detail.lines() {
        eprintln!("    {}", line);
      }
    }
    self.id()
  }

  fn success(&self, message: &str, detail: Option<&str>) -> NotificationId {
    print_success(self.format, message);
    if let Some(detail) = detail {
      print_detail(self.format, detail);
    }
    self.id()
  }

  fn credentials_missing(&self, notification: NotificationId) {
    debug!(notification = notification.0, "credentials missing");
    print_warning("Pass --credentials, or set VCAP_SERVICES to the path of a credentials document.");
  }

  fn dismiss(&self, notification: NotificationId) {
    debug!(notification = notification.0, "notification dismissed");
  }

  fn service_dormant(&self, message: &str) -> Remediation {
    print_warning(message);
    match confirm("Start the Streaming Analytics service and retry?", self.auto_start) {
      Ok(true) => Remediation::StartAndRetry,
      Ok(false) => match confirm("Open the cloud dashboard instead?", false) {
        Ok(true) => Remediation::OpenDashboard,
        _ => Remediation::Dismiss,
      },
      Err(e) => {
        warn!(error = %e, "cannot ask how to handle the dormant service");
        print_warning(&e.to_string());
        Remediation::Dismiss
      }
    }
  }
}

impl LintHandler for Terminal {
  fn lint(&self, status: &BuildStatus) {
    for diagnostic in lint::diagnostics_for(status, self.app_root.as_deref()) {
      match diagnostic.severity {
        Severity::Error => print_error(&diagnostic.to_string()),
        Severity::Warning => print_warning(&diagnostic.to_string()),
        Severity::Info => print_info(self.format, &diagnostic.to_string()),
      }
    }
  }
}

/// Prints URLs instead of opening them.
impl UrlOpener for Terminal {
  fn open_url(&self, url: &str) {
    print_stat(self.format, "Open", url);
  }
}

impl Clipboard for Terminal {
  fn write_text(&self, text: &str) {
    debug!(text = %text, "clipboard write skipped on terminal");
  }
}
