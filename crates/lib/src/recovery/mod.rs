//! Recovery from a dormant compute service.
//!
//! A service error carrying one of [`DORMANT_SERVICE_CODES`] means the
//! backing service is stopped. The user is asked for a remediation; starting
//! the service polls its state until it reports started, after which the
//! caller replays the failed operation exactly once.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::{BuildClient, ClientError};
use crate::config::EngineConfig;
use crate::consts::DORMANT_SERVICE_CODES;
use crate::credentials::Session;
use crate::engine::RetryCommand;
use crate::handler::{MessageHandler, NotificationId, Remediation, UrlOpener};
use crate::types::{ServiceInfo, ServiceState};

#[derive(Debug, Error)]
pub enum RecoveryError {
  #[error(transparent)]
  Client(#[from] ClientError),

  #[error("service start cancelled")]
  Cancelled,

  /// The user chose not to start the service.
  #[error("service start declined")]
  Declined,
}

/// Whether an error can be recovered from by starting the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
  Recoverable,
  Terminal,
}

/// Whether a service message names a dormant-service code.
pub fn is_dormant_message(message: &str) -> bool {
  DORMANT_SERVICE_CODES.iter().any(|code| message.contains(code))
}

pub fn classify(error: &ClientError) -> Classification {
  match error.service_message() {
    Some(message) if is_dormant_message(message) => Classification::Recoverable,
    _ => Classification::Terminal,
  }
}

/// The operation to replay and the notifications shown while recovering.
#[derive(Debug, Clone)]
pub struct RetryContext {
  pub command: RetryCommand,
  pub pending_notifications: Vec<NotificationId>,
}

impl RetryContext {
  pub fn new(command: RetryCommand, pending_notifications: Vec<NotificationId>) -> Self {
    Self {
      command,
      pending_notifications,
    }
  }
}

/// Host capabilities used during recovery.
pub struct RecoveryContext<'a> {
  pub config: &'a EngineConfig,
  pub messages: &'a dyn MessageHandler,
  pub urls: &'a dyn UrlOpener,
  pub cancel: &'a AtomicBool,
}

/// Request a service start and wait until the service reports started.
///
/// The state is re-read every `service_poll_interval`; polling stops as soon
/// as a started state is seen, including in the start response itself.
pub async fn start_service<C: BuildClient>(
  client: &C,
  session: &Session,
  config: &EngineConfig,
  cancel: &AtomicBool,
) -> Result<ServiceInfo, RecoveryError> {
  info!("starting service");
  let mut info = client.patch_service_state(session, ServiceState::Started).await?;

  while !info.is_started() {
    tokio::time::sleep(config.service_poll_interval).await;
    if cancel.load(Ordering::SeqCst) {
      return Err(RecoveryError::Cancelled);
    }
    info = client.get_service_info(session).await?;
    debug!(state = ?info.state, "service state");
  }

  info!("service started");
  Ok(info)
}

/// Drive recovery for a dormant-service error carrying `message`.
///
/// Returns `Ok(())` once the service has started and `context.command` should
/// be replayed. [`RecoveryError::Declined`] means the user did not ask for a
/// start and the caller should report its original error. A start request
/// rejected because the service is still dormant is retried after
/// `service_poll_interval`, once the user asks again.
pub async fn recover<C: BuildClient>(
  client: &C,
  session: &Session,
  ctx: &RecoveryContext<'_>,
  message: &str,
  context: &mut RetryContext,
) -> Result<(), RecoveryError> {
  let mut message = message.to_string();

  loop {
    warn!(error = %message, "service is not running");
    let notice = ctx.messages.error(
      "Verify that the Streaming Analytics service is started and able to handle requests.",
      Some(&message),
    );
    context.pending_notifications.push(notice);

    match ctx.messages.service_dormant(&message) {
      Remediation::Dismiss => return Err(RecoveryError::Declined),
      Remediation::OpenDashboard => {
        ctx.urls.open_url(&ctx.config.dashboard_url);
        return Err(RecoveryError::Declined);
      }
      Remediation::StartAndRetry => {}
    }

    let starting = ctx.messages.info("Streaming Analytics service is starting...", None);
    let result = start_service(client, session, ctx.config, ctx.cancel).await;
    ctx.messages.dismiss(starting);

    match result {
      Ok(_) => {
        for notification in context.pending_notifications.drain(..) {
          ctx.messages.dismiss(notification);
        }
        ctx.messages.success(
          "Streaming Analytics service started",
          Some("Service has been started. Retrying Build Service request..."),
        );
        return Ok(());
      }
      Err(RecoveryError::Client(e)) if classify(&e) == Classification::Recoverable => {
        let id = ctx.messages.error(&e.to_string(), None);
        context.pending_notifications.push(id);
        message = e.service_message().unwrap_or_default().to_string();

        tokio::time::sleep(ctx.config.service_poll_interval).await;
        if ctx.cancel.load(Ordering::SeqCst) {
          return Err(RecoveryError::Cancelled);
        }
      }
      Err(e) => {
        ctx.messages.error("Error starting service", Some(&e.to_string()));
        return Err(e);
      }
    }
  }
}
