//! Dispatch queue repository - lease-based message table.
//!
//! A message is visible when it has never been leased or its lease has
//! expired. Claiming is a single `UPDATE … RETURNING` statement, so two
//! consumers (threads or processes) can never hold the same live lease.

use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};

/// A claimed queue row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRow {
    pub id: i64,
    pub job_id: String,
    pub artifact_ref: String,
    pub query: String,
    /// How many times this message has been handed out, including this one.
    pub deliveries: u32,
}

/// Appends a message and returns its row id.
pub fn enqueue(
    db: &Database,
    job_id: &str,
    artifact_ref: &str,
    query: &str,
    enqueued_at: &str,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO dispatch_queue (job_id, artifact_ref, query, enqueued_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![job_id, artifact_ref, query, enqueued_at],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Leases the oldest visible message to `owner` until `now_ms + lease_ms`.
pub fn claim_next(
    db: &Database,
    owner: &str,
    now_ms: i64,
    lease_ms: i64,
) -> Result<Option<QueueRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "UPDATE dispatch_queue
                 SET leased_until = ?1, lease_owner = ?2, deliveries = deliveries + 1
                 WHERE id = (
                     SELECT id FROM dispatch_queue
                     WHERE leased_until IS NULL OR leased_until <= ?3
                     ORDER BY id
                     LIMIT 1
                 )
                 RETURNING id, job_id, artifact_ref, query, deliveries",
                params![now_ms + lease_ms, owner, now_ms],
                |r| {
                    Ok(QueueRow {
                        id: r.get(0)?,
                        job_id: r.get(1)?,
                        artifact_ref: r.get(2)?,
                        query: r.get(3)?,
                        deliveries: r.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    })
}

/// Removes a message still leased to `owner`.
///
/// Returns `false` if the lease had expired and the message was claimed by
/// someone else in the meantime; that consumer will acknowledge it.
pub fn ack(db: &Database, id: i64, owner: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute(
            "DELETE FROM dispatch_queue WHERE id = ?1 AND lease_owner = ?2",
            params![id, owner],
        )?;
        Ok(deleted == 1)
    })
}

/// Pushes the lease held by `owner` out to `leased_until`.
///
/// Returns `false` when `owner` no longer holds the lease.
pub fn renew(
    db: &Database,
    id: i64,
    owner: &str,
    leased_until: i64,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE dispatch_queue SET leased_until = ?1 WHERE id = ?2 AND lease_owner = ?3",
            params![leased_until, id, owner],
        )?;
        Ok(updated == 1)
    })
}

/// Number of messages not yet acknowledged.
pub fn depth(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 =
            conn.query_row("SELECT COUNT(*) FROM dispatch_queue", [], |r| r.get(0))?;
        Ok(count)
    })
}
