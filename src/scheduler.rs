//! Deferred invocation
//!
//! Tools schedule named invocations to run after a delay. The scheduler holds
//! one sleeping task per request and hands due invocations to a channel; the
//! dispatcher consumes the channel and performs them.

use crate::bot::transport::ChatTransport;
use crate::response::OutboundMessage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::select;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Invocation name that sends a text message to a chat
pub const SEND_MESSAGE: &str = "send_message";

/// Errors raised when scheduling or dispatching deferred work
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler was shut down
    #[error("scheduler is shut down")]
    Closed,
    /// The delay puts the due time past the representable calendar
    #[error("delay of {0} ms is out of range")]
    DelayOutOfRange(u64),
    /// Invocation arguments do not match the invocation
    #[error("invalid arguments for {name}: {message}")]
    InvalidArguments {
        /// Invocation name
        name: String,
        /// Decode error
        message: String,
    },
    /// No handler exists for the invocation name
    #[error("unknown invocation: {0}")]
    UnknownInvocation(String),
    /// The handler failed
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// A named call that became due
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledInvocation {
    /// Invocation name
    pub name: String,
    /// Invocation arguments
    pub arguments: Value,
    /// When the invocation was due
    pub due_at: DateTime<Utc>,
}

/// Arguments of a `send_message` invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageArgs {
    /// Message text
    pub message: String,
    /// Destination chat
    pub chat_id: String,
}

/// Accepts named invocations to run later
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeferredInvoker: Send + Sync {
    /// Schedules `name(arguments)` to run after `delay_ms` milliseconds.
    /// Acceptance is success; delivery is not acknowledged.
    async fn invoke_later(
        &self,
        name: &str,
        delay_ms: u64,
        arguments: Value,
    ) -> Result<(), SchedulerError>;
}

/// In-process scheduler built on tokio timers
#[derive(Clone)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<ScheduledInvocation>,
    cancel: CancellationToken,
}

impl TokioScheduler {
    /// Create a scheduler and the receiving end of its due-invocation channel.
    /// Cancelling `cancel` drops every pending invocation.
    #[must_use]
    pub fn new(cancel: CancellationToken) -> (Self, mpsc::UnboundedReceiver<ScheduledInvocation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, cancel }, rx)
    }
}

#[async_trait]
impl DeferredInvoker for TokioScheduler {
    async fn invoke_later(
        &self,
        name: &str,
        delay_ms: u64,
        arguments: Value,
    ) -> Result<(), SchedulerError> {
        if self.cancel.is_cancelled() || self.tx.is_closed() {
            return Err(SchedulerError::Closed);
        }

        let delay = Duration::from_millis(delay_ms);
        let due_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|offset| Utc::now().checked_add_signed(offset))
            .ok_or(SchedulerError::DelayOutOfRange(delay_ms))?;
        let invocation = ScheduledInvocation {
            name: name.to_string(),
            arguments,
            due_at,
        };
        info!(name, delay_ms, due_at = %due_at, "Scheduled invocation");

        let tx = self.tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            select! {
                () = tokio::time::sleep(delay) => {
                    if tx.send(invocation).is_err() {
                        warn!("Dispatcher gone, dropping due invocation");
                    }
                }
                () = cancel.cancelled() => {
                    debug!(name = %invocation.name, "Pending invocation cancelled");
                }
            }
        });

        Ok(())
    }
}

/// Performs one due invocation
///
/// # Errors
///
/// Returns an error for unknown names, malformed arguments or failed delivery.
pub async fn dispatch_one(
    invocation: &ScheduledInvocation,
    transport: &dyn ChatTransport,
) -> Result<(), SchedulerError> {
    match invocation.name.as_str() {
        SEND_MESSAGE => {
            let args: SendMessageArgs = serde_json::from_value(invocation.arguments.clone())
                .map_err(|e| SchedulerError::InvalidArguments {
                    name: invocation.name.clone(),
                    message: e.to_string(),
                })?;
            transport
                .send(&OutboundMessage::text(args.chat_id, args.message))
                .await
                .map_err(|e| SchedulerError::Delivery(e.to_string()))
        }
        other => Err(SchedulerError::UnknownInvocation(other.to_string())),
    }
}

/// Consumes due invocations until the channel closes or `cancel` fires
pub async fn dispatch_deferred(
    mut rx: mpsc::UnboundedReceiver<ScheduledInvocation>,
    transport: Arc<dyn ChatTransport>,
    cancel: CancellationToken,
) {
    loop {
        let invocation = select! {
            next = rx.recv() => match next {
                Some(invocation) => invocation,
                None => break,
            },
            () = cancel.cancelled() => break,
        };

        match dispatch_one(&invocation, transport.as_ref()).await {
            Ok(()) => info!(name = %invocation.name, "Deferred invocation delivered"),
            Err(e) => error!(name = %invocation.name, error = %e, "Deferred invocation failed"),
        }
    }
    debug!("Deferred dispatcher stopped");
}
