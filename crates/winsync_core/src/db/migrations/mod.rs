//! Record store schema migrations.
//!
//! # Responsibility
//! - List the record store schema steps in version order.
//! - Bring a connection up to `latest_version()` inside one transaction.
//!
//! # Invariants
//! - Versions start at 1 and increase by one per step.
//! - `PRAGMA user_version` equals the last applied step.
//! - Either every pending step is applied or none is.
//!
//! # Steps
//! - 1 `records`: one JSON payload row per window record, ordered by `seq`.
//! - 2 `record_audit`: one `record_saves` row per successful save.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "records",
        sql: include_str!("0001_records.sql"),
    },
    Migration {
        version: 2,
        name: "record_audit",
        sql: include_str!("0002_record_audit.sql"),
    },
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies every step newer than the connection's schema version.
///
/// Returns the versions that were applied, oldest first.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the store is newer than this build.
/// - `Migration` naming the first step that failed; nothing is applied.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<Vec<u32>> {
    run_steps(conn, MIGRATIONS)
}

fn run_steps(conn: &mut Connection, steps: &[Migration]) -> DbResult<Vec<u32>> {
    let from: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest = steps.last().map_or(0, |step| step.version);
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Migration> = steps.iter().filter(|step| step.version > from).collect();
    if pending.is_empty() {
        debug!("event=db_migrate module=db status=current version={from}");
        return Ok(Vec::new());
    }

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", step.version))
            .map_err(|source| DbError::Migration {
                version: step.version,
                name: step.name,
                source,
            })?;
        debug!(
            "event=db_migrate module=db status=step version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={from} to_version={latest}");
    Ok(pending.iter().map(|step| step.version).collect())
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version, run_steps, Migration};
    use crate::db::DbError;
    use rusqlite::Connection;

    fn user_version(conn: &Connection) -> u32 {
        conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn fresh_store_applies_every_step_once() {
        let mut conn = Connection::open_in_memory().unwrap();
        let applied = apply_migrations(&mut conn).unwrap();
        assert_eq!(applied, (1..=latest_version()).collect::<Vec<_>>());
        assert!(apply_migrations(&mut conn).unwrap().is_empty());
    }

    #[test]
    fn failing_step_rolls_back_and_names_itself() {
        let steps = [
            Migration {
                version: 1,
                name: "things",
                sql: "CREATE TABLE things (id INTEGER PRIMARY KEY);",
            },
            Migration {
                version: 2,
                name: "broken",
                sql: "CREATE TABLE things (id INTEGER PRIMARY KEY);",
            },
        ];
        let mut conn = Connection::open_in_memory().unwrap();

        let err = run_steps(&mut conn, &steps).unwrap_err();
        assert!(matches!(
            err,
            DbError::Migration {
                version: 2,
                name: "broken",
                ..
            }
        ));
        assert!(err.is_schema_error());
        assert_eq!(user_version(&conn), 0);
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'things';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }
}
