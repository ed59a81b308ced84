//! Outbound status-change events.
//!
//! The service publishes a [`StatusChangeNotice`] after a transition has committed. Publishing
//! only enqueues; a [`DeliveryWorker`] drains the queue on a tokio task and hands each notice
//! to the [`NotificationSink`] with bounded retries.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::domain::{ApplicationId, ApplicationStatus, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangeNotice {
    pub application_id: ApplicationId,
    pub owner_id: UserId,
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub comment: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification queue is full")]
    QueueFull,
    #[error("notification queue is closed")]
    QueueClosed,
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Service-side hook. Must not block the caller.
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notice: StatusChangeNotice) -> Result<(), NotificationError>;
}

/// Delivery-side adapter (mail, webhooks, ...).
pub trait NotificationSink: Send + Sync {
    fn notify_status_change(&self, notice: &StatusChangeNotice) -> Result<(), NotificationError>;
}

/// Bounded in-process queue in front of the delivery worker.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<StatusChangeNotice>,
}

impl NotificationQueue {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<StatusChangeNotice>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl NotificationPublisher for NotificationQueue {
    fn publish(&self, notice: StatusChangeNotice) -> Result<(), NotificationError> {
        self.sender.try_send(notice).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => NotificationError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => NotificationError::QueueClosed,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(200))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub retried: u64,
    pub dropped: u64,
}

/// Drains the notification queue until every publisher has been dropped.
pub struct DeliveryWorker<S> {
    receiver: mpsc::Receiver<StatusChangeNotice>,
    sink: Arc<S>,
    policy: RetryPolicy,
}

impl<S> DeliveryWorker<S>
where
    S: NotificationSink + 'static,
{
    pub fn new(
        receiver: mpsc::Receiver<StatusChangeNotice>,
        sink: Arc<S>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            receiver,
            sink,
            policy,
        }
    }

    pub fn spawn(self) -> JoinHandle<DeliveryStats> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) -> DeliveryStats {
        let mut stats = DeliveryStats::default();

        while let Some(notice) = self.receiver.recv().await {
            self.deliver(&notice, &mut stats).await;
        }

        debug!(?stats, "notification queue closed");
        stats
    }

    async fn deliver(&self, notice: &StatusChangeNotice, stats: &mut DeliveryStats) {
        for attempt in 1..=self.policy.max_attempts {
            match self.sink.notify_status_change(notice) {
                Ok(()) => {
                    stats.delivered += 1;
                    return;
                }
                Err(err) if attempt < self.policy.max_attempts => {
                    stats.retried += 1;
                    warn!(
                        application_id = %notice.application_id,
                        attempt,
                        error = %err,
                        "status notification failed, retrying"
                    );
                    tokio::time::sleep(self.policy.delay_for(attempt)).await;
                }
                Err(err) => {
                    stats.dropped += 1;
                    warn!(
                        application_id = %notice.application_id,
                        attempts = attempt,
                        error = %err,
                        "status notification dropped"
                    );
                }
            }
        }
    }
}

/// Sink that only records notices in the service log.
#[derive(Debug, Default, Clone)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify_status_change(&self, notice: &StatusChangeNotice) -> Result<(), NotificationError> {
        info!(
            application_id = %notice.application_id,
            owner_id = %notice.owner_id,
            from = %notice.from,
            to = %notice.to,
            comment = %notice.comment,
            "status change notice"
        );
        Ok(())
    }
}
