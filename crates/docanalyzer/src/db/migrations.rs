//! Embedded schema migrations.
//!
//! Applied versions are recorded in `_migrations`. Each pending migration
//! runs in its own transaction together with its bookkeeping row.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
    /// `(table, column)` added by this migration; skipped if already there.
    adds_column: Option<(&'static str, &'static str)>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_jobs_table",
        sql: include_str!("sql/001_create_jobs.sql"),
        adds_column: None,
    },
    Migration {
        version: 2,
        name: "create_dispatch_queue_table",
        sql: include_str!("sql/002_create_dispatch_queue.sql"),
        adds_column: None,
    },
    Migration {
        version: 3,
        name: "add_completed_at_to_jobs",
        sql: include_str!("sql/003_add_completed_at.sql"),
        adds_column: Some(("jobs", "completed_at")),
    },
];

/// Brings the schema up to the latest version.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied = applied_version(conn)?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        apply(conn, migration)?;
    }
    Ok(())
}

fn applied_version(conn: &Connection) -> Result<u32, DatabaseError> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), DatabaseError> {
    let failed = |e: rusqlite::Error| DatabaseError::Migration {
        version: migration.version,
        reason: e.to_string(),
    };

    let present = match migration.adds_column {
        Some((table, column)) => column_exists(conn, table, column)?,
        None => false,
    };

    let tx = conn.unchecked_transaction().map_err(failed)?;
    if present {
        log::info!("Migration v{} already in place, recording it", migration.version);
    } else {
        log::info!("Applying migration v{}: {}", migration.version, migration.name);
        tx.execute_batch(migration.sql).map_err(failed)?;
    }
    tx.execute(
        "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
        params![migration.version, migration.name],
    )
    .map_err(failed)?;
    tx.commit().map_err(failed)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DatabaseError::Migration {
            version: 0,
            reason: format!("Invalid table name: {}", table),
        });
    }
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    Ok(names.any(|name| name.is_ok_and(|name| name == column)))
}
