//! Durable dispatch over the `dispatch_queue` table.
//!
//! Every claim takes a lease with a fresh token. A consumer that dies
//! without acking loses its lease after `lease` and the message becomes
//! visible again, which also makes it visible to a separate worker process
//! sharing the database file.

use std::time::{Duration, Instant};

use chrono::Utc;

use super::{Delivery, DispatchMessage, DispatchQueue, Receipt};
use crate::db::{queue_repo, Database, DatabaseError};
use crate::error::QueueError;

fn unavailable(e: DatabaseError) -> QueueError {
    QueueError::BrokerUnavailable(e.to_string())
}

pub struct SqliteQueue {
    db: Database,
    lease: Duration,
    poll_interval: Duration,
}

impl SqliteQueue {
    pub fn new(db: Database, lease: Duration, poll_interval: Duration) -> Self {
        Self {
            db,
            lease,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    fn lease_ms(&self) -> i64 {
        i64::try_from(self.lease.as_millis()).unwrap_or(i64::MAX / 2)
    }

    fn try_claim(&self) -> Result<Option<Delivery>, QueueError> {
        let token = uuid::Uuid::new_v4().to_string();
        let now_ms = Utc::now().timestamp_millis();

        let row = queue_repo::claim_next(&self.db, &token, now_ms, self.lease_ms())
            .map_err(unavailable)?;

        Ok(row.map(|row| Delivery {
            message: DispatchMessage::new(row.job_id, row.artifact_ref, row.query),
            attempt: row.deliveries,
            receipt: Receipt::Lease {
                row_id: row.id,
                token,
            },
        }))
    }
}

impl DispatchQueue for SqliteQueue {
    fn enqueue(&self, message: &DispatchMessage) -> Result<(), QueueError> {
        queue_repo::enqueue(
            &self.db,
            &message.job_id,
            &message.artifact_ref.to_string_lossy(),
            &message.query,
            &Utc::now().to_rfc3339(),
        )
        .map_err(unavailable)?;
        Ok(())
    }

    fn dequeue(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(delivery) = self.try_claim()? {
                return Ok(Some(delivery));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let Receipt::Lease { row_id, token } = &delivery.receipt else {
            return Ok(());
        };

        if !queue_repo::ack(&self.db, *row_id, token).map_err(unavailable)? {
            log::warn!(
                "Lease on job {} expired before ack; another consumer holds it",
                delivery.message.job_id
            );
        }
        Ok(())
    }

    fn renew(&self, delivery: &Delivery) -> Result<bool, QueueError> {
        let Receipt::Lease { row_id, token } = &delivery.receipt else {
            return Ok(true);
        };

        let leased_until = Utc::now().timestamp_millis() + self.lease_ms();
        queue_repo::renew(&self.db, *row_id, token, leased_until).map_err(unavailable)
    }

    fn renewal_interval(&self) -> Option<Duration> {
        Some((self.lease / 3).max(Duration::from_millis(1)))
    }

    fn depth(&self) -> Result<u64, QueueError> {
        queue_repo::depth(&self.db).map_err(unavailable)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
