//! Fire-and-forget email notifications.
//!
//! Callers hand a `Notification` to the `Notifier`, which only enqueues it.
//! A detached worker drains the queue into a `MailTransport`; delivery
//! failures are logged and dropped.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, n: &Notification) -> Result<(), NotifyError> {
        tracing::info!(to = %n.to, subject = %n.subject, "email: {}", n.body);
        Ok(())
    }
}

/// Publishes notifications as JSON on a NATS subject for a mailer to pick up.
#[derive(Clone)]
pub struct NatsTransport {
    client: async_nats::Client,
    subject: String,
}

impl NatsTransport {
    pub fn new(client: async_nats::Client, subject: impl Into<String>) -> Self {
        Self { client, subject: subject.into() }
    }

    pub async fn connect(url: &str, subject: impl Into<String>) -> Result<Self, NotifyError> {
        let client = async_nats::connect(url).await.map_err(|e| NotifyError(e.to_string()))?;
        Ok(Self::new(client, subject))
    }
}

/// NATS when `nats_url` is set and reachable, the log otherwise.
pub async fn transport_from(nats_url: Option<&str>, subject: &str) -> Arc<dyn MailTransport> {
    let Some(url) = nats_url else { return Arc::new(LogTransport) };
    match NatsTransport::connect(url, subject).await {
        Ok(nats) => {
            tracing::info!(%subject, "publishing notifications to NATS");
            Arc::new(nats)
        }
        Err(e) => {
            tracing::warn!(%url, error = %e, "NATS unreachable, logging notifications instead");
            Arc::new(LogTransport)
        }
    }
}

#[async_trait]
impl MailTransport for NatsTransport {
    async fn send(&self, n: &Notification) -> Result<(), NotifyError> {
        let payload = serde_json::to_vec(n).map_err(|e| NotifyError(e.to_string()))?;
        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| NotifyError(e.to_string()))
    }
}

/// Handle to the notification queue.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Notification>,
}

impl Notifier {
    /// Starts the delivery worker on the current runtime.
    pub fn spawn(transport: Arc<dyn MailTransport>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Notification>(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(n) = rx.recv().await {
                if let Err(e) = transport.send(&n).await {
                    tracing::warn!(to = %n.to, subject = %n.subject, error = %e, "dropping notification");
                }
            }
            tracing::debug!("notification worker stopped");
        });
        (Self { tx }, worker)
    }

    /// Enqueues without waiting. A full or closed queue drops the message.
    pub fn notify(&self, n: Notification) {
        match self.tx.try_send(n) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => tracing::warn!(to = %n.to, subject = %n.subject, "notification queue full, dropping"),
            Err(TrySendError::Closed(n)) => tracing::warn!(to = %n.to, subject = %n.subject, "notification worker gone, dropping"),
        }
    }
}
