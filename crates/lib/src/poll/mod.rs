//! Build status polling.
//!
//! The poller queries a submitted build until it reaches `built` or `failed`.
//! Each observation is merged into the accumulated status so the build state
//! never moves backwards, and the messages appended since the previous
//! observation (the output delta) are recorded. Output is forwarded to the
//! message handler on every `notify_every`th re-query and once more when the
//! build ends.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::{BuildClient, ClientError};
use crate::config::EngineConfig;
use crate::credentials::Session;
use crate::handler::{LintHandler, MessageHandler};
use crate::types::{BuildMessage, BuildRequest, BuildState, BuildStatus};

#[derive(Debug, Error)]
pub enum PollError {
  #[error(transparent)]
  Client(#[from] ClientError),

  /// The service reported the build as failed.
  #[error("build failed - {target}")]
  BuildFailed { target: String, output: Vec<BuildMessage> },

  #[error("build monitoring cancelled")]
  Cancelled,
}

/// Messages appended to `current` beyond the first `previous_len`.
///
/// A list that did not grow yields an empty delta.
pub fn output_delta(current: &[BuildMessage], previous_len: usize) -> &[BuildMessage] {
  if current.len() > previous_len {
    &current[previous_len..]
  } else {
    &[]
  }
}

/// Tracks how much build output has been seen.
#[derive(Debug, Clone, Default)]
pub struct OutputTracker {
  observed: usize,
}

impl OutputTracker {
  /// Delta for `output`, then remember its length.
  pub fn observe<'a>(&mut self, output: &'a [BuildMessage]) -> &'a [BuildMessage] {
    let delta = output_delta(output, self.observed);
    self.observed = output.len();
    delta
  }
}

/// Fold a new observation into the accumulated status.
///
/// A state that would move backwards is ignored; output and artifacts always
/// come from the newest observation.
pub fn merge_status(accumulated: BuildStatus, observed: BuildStatus) -> BuildStatus {
  let status = if accumulated.status.regresses_to(observed.status) {
    warn!(
      from = %accumulated.status,
      to = %observed.status,
      "ignoring backwards build state transition"
    );
    accumulated.status
  } else {
    observed.status
  };

  let artifacts = if status == BuildState::Built {
    observed.artifacts
  } else {
    Vec::new()
  };

  BuildStatus {
    status,
    output: observed.output,
    artifacts,
  }
}

/// Result of polling a build to success.
#[derive(Debug, Clone)]
pub struct PollOutcome {
  /// Final merged status; always `built`.
  pub status: BuildStatus,
  /// Output delta of every observation, starting with the first query.
  pub deltas: Vec<Vec<BuildMessage>>,
}

/// Collaborators and settings for one polling run.
pub struct PollContext<'a> {
  pub config: &'a EngineConfig,
  pub messages: &'a dyn MessageHandler,
  pub lint: &'a dyn LintHandler,
  pub cancel: &'a AtomicBool,
}

impl PollContext<'_> {
  fn check_cancelled(&self) -> Result<(), PollError> {
    if self.cancel.load(Ordering::SeqCst) {
      info!("build monitoring cancelled");
      return Err(PollError::Cancelled);
    }
    Ok(())
  }

  fn detail(&self, pending: &[BuildMessage]) -> Option<String> {
    if pending.is_empty() {
      None
    } else {
      Some(self.messages.loggable_message(pending))
    }
  }
}

/// Poll `request` until the build ends.
///
/// Returns the outcome for `built` and [`PollError::BuildFailed`] for
/// `failed`; both run the lint pass first. There is no overall deadline.
pub async fn poll_build<C: BuildClient>(
  client: &C,
  session: &Session,
  request: &BuildRequest,
  ctx: &PollContext<'_>,
) -> Result<PollOutcome, PollError> {
  let label = request.target.label();
  let building = format!("Building {}...", label);
  let notify_every = ctx.config.notify_every.max(1);

  ctx.messages.info(&building, None);
  info!(build = %request.id, target = %label, "polling build status");

  let mut tracker = OutputTracker::default();
  let mut deltas = Vec::new();
  let mut pending: Vec<BuildMessage> = Vec::new();

  ctx.check_cancelled()?;
  let mut current = client.get_status(session, request).await?;
  let delta = tracker.observe(&current.output).to_vec();
  pending.extend_from_slice(&delta);
  deltas.push(delta);

  let mut tick: u32 = 0;
  while !current.status.is_terminal() {
    tokio::time::sleep(ctx.config.build_poll_interval).await;
    ctx.check_cancelled()?;

    let observed = client.get_status(session, request).await?;
    current = merge_status(current, observed);
    let delta = tracker.observe(&current.output).to_vec();
    debug!(tick, status = %current.status, new_messages = delta.len(), "build status observed");
    pending.extend_from_slice(&delta);
    deltas.push(delta);

    if !current.status.is_terminal() && tick % notify_every == 0 {
      let detail = ctx.detail(&pending);
      ctx.messages.info(&building, detail.as_deref());
      pending.clear();
    }
    tick += 1;
  }

  ctx.lint.lint(&current);
  let detail = ctx.detail(&pending);

  match current.status {
    BuildState::Built => {
      info!(build = %request.id, artifacts = current.artifacts.len(), "build succeeded");
      ctx
        .messages
        .success(&format!("Build succeeded - {}", label), detail.as_deref());
      Ok(PollOutcome { status: current, deltas })
    }
    _ => {
      warn!(build = %request.id, "build failed");
      ctx.messages.error(&format!("Build failed - {}", label), detail.as_deref());
      Err(PollError::BuildFailed {
        target: label,
        output: current.output,
      })
    }
  }
}
