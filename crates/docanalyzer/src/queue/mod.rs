//! Dispatch queue: carries job execution requests to workers.
//!
//! Delivery is at-least-once. A consumer must [`DispatchQueue::ack`] a
//! delivery once the job has reached a terminal state; anything not acked
//! may be handed out again.

pub mod channel;
pub mod sqlite;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::QueueError;

pub use channel::ChannelQueue;
pub use sqlite::SqliteQueue;

/// A request to execute one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchMessage {
    pub job_id: String,
    pub artifact_ref: PathBuf,
    pub query: String,
}

impl DispatchMessage {
    pub fn new(
        job_id: impl Into<String>,
        artifact_ref: impl Into<PathBuf>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            artifact_ref: artifact_ref.into(),
            query: query.into(),
        }
    }
}

/// Backend-specific handle needed to acknowledge a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receipt {
    /// In-process channel; nothing to acknowledge.
    Channel,
    /// Leased row in the `dispatch_queue` table.
    Lease { row_id: i64, token: String },
}

/// A message handed to exactly one consumer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: DispatchMessage,
    /// 1 on first delivery, higher when redelivered after a lost lease.
    pub attempt: u32,
    pub receipt: Receipt,
}

impl Delivery {
    pub fn is_redelivery(&self) -> bool {
        self.attempt > 1
    }
}

/// Competing-consumer message channel between submission and workers.
pub trait DispatchQueue: Send + Sync {
    /// Fails with [`QueueError::BrokerUnavailable`] when the channel cannot
    /// accept writes.
    fn enqueue(&self, message: &DispatchMessage) -> Result<(), QueueError>;

    /// Waits up to `timeout` for the next message.
    fn dequeue(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError>;

    /// Marks a delivery as processed; it will not be delivered again.
    fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Extends the hold on a delivery that is still being worked on.
    ///
    /// Returns `false` when the delivery is no longer held by this consumer.
    fn renew(&self, _delivery: &Delivery) -> Result<bool, QueueError> {
        Ok(true)
    }

    /// How often a consumer should call [`renew`](Self::renew), or `None`
    /// when deliveries never expire.
    fn renewal_interval(&self) -> Option<Duration> {
        None
    }

    /// Messages enqueued but not yet acknowledged, when the backend knows.
    fn depth(&self) -> Result<u64, QueueError>;

    fn name(&self) -> &'static str;
}
