//! Record repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Load and store full record snapshots for one window.
//! - Provide the ordered record sequence used for next/previous navigation.
//!
//! # Invariants
//! - Records of a window are ordered by `seq`; a new record is appended last.
//! - Read paths reject undecodable payloads instead of masking them.
//! - Every save is attributed to the explicit `SessionContext` passed in.
//! - The record row and its audit row are written in one transaction.

use crate::db::DbError;
use crate::model::snapshot::{RecordRef, RecordSnapshot};
use crate::session::SessionContext;
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for record persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
    Unavailable(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::Unavailable(message) => write!(f, "record store unavailable: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistence collaborator of a record model.
pub trait RecordRepository: Send {
    /// Record references of `window_id` in navigation order.
    fn list_refs(&self, window_id: &str) -> RepoResult<Vec<RecordRef>>;
    fn load(&self, window_id: &str, record: &RecordRef) -> RepoResult<Option<RecordSnapshot>>;
    /// Inserts or replaces one record.
    fn save(
        &self,
        window_id: &str,
        record: &RecordRef,
        snapshot: &RecordSnapshot,
        session: &SessionContext,
    ) -> RepoResult<()>;
}

/// SQLite-backed record repository.
pub struct SqliteRecordRepository {
    conn: Connection,
}

impl SqliteRecordRepository {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Number of audited saves of one record.
    pub fn save_count(&self, window_id: &str, record: &RecordRef) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM record_saves WHERE window_id = ?1 AND record_ref = ?2;",
            params![window_id, record.as_str()],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

impl RecordRepository for SqliteRecordRepository {
    fn list_refs(&self, window_id: &str) -> RepoResult<Vec<RecordRef>> {
        let mut stmt = self.conn.prepare(
            "SELECT record_ref
             FROM records
             WHERE window_id = ?1
             ORDER BY seq ASC, record_ref ASC;",
        )?;
        let mut rows = stmt.query([window_id])?;
        let mut refs = Vec::new();
        while let Some(row) = rows.next()? {
            refs.push(RecordRef::new(row.get::<_, String>(0)?));
        }
        Ok(refs)
    }

    fn load(&self, window_id: &str, record: &RecordRef) -> RepoResult<Option<RecordSnapshot>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM records WHERE window_id = ?1 AND record_ref = ?2;",
                params![window_id, record.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };
        let snapshot = serde_json::from_str::<RecordSnapshot>(&payload).map_err(|err| {
            warn!(
                "event=record_load module=repo status=error window={window_id} record={record} error={err}"
            );
            RepoError::InvalidData(format!("record `{record}` payload: {err}"))
        })?;
        Ok(Some(snapshot))
    }

    fn save(
        &self,
        window_id: &str,
        record: &RecordRef,
        snapshot: &RecordSnapshot,
        session: &SessionContext,
    ) -> RepoResult<()> {
        let payload = serde_json::to_string(snapshot)
            .map_err(|err| RepoError::InvalidData(format!("record `{record}` payload: {err}")))?;

        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO records (
                window_id,
                record_ref,
                seq,
                payload,
                client_id,
                org_id,
                updated_by
            ) VALUES (
                ?1,
                ?2,
                (SELECT COALESCE(MAX(seq), 0) + 1 FROM records WHERE window_id = ?1),
                ?3,
                ?4,
                ?5,
                ?6
            )
            ON CONFLICT (window_id, record_ref) DO UPDATE SET
                payload = excluded.payload,
                org_id = excluded.org_id,
                updated_by = excluded.updated_by,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                window_id,
                record.as_str(),
                payload,
                session.client_id,
                session.org_id,
                session.user.as_str(),
            ],
        )?;
        tx.execute(
            "INSERT INTO record_saves (window_id, record_ref, client_id, org_id, saved_by)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                window_id,
                record.as_str(),
                session.client_id,
                session.org_id,
                session.user.as_str(),
            ],
        )?;
        tx.commit()?;

        debug!("event=record_save module=repo status=ok window={window_id} record={record}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{RecordRepository, RepoError, SqliteRecordRepository};
    use crate::db::open_db_in_memory;
    use crate::model::property_name::PropertyName;
    use crate::model::snapshot::{RecordRef, RecordSnapshot};
    use crate::model::value::PropertyValue;
    use crate::session::SessionContext;
    use rusqlite::params;

    fn repo() -> SqliteRecordRepository {
        SqliteRecordRepository::new(open_db_in_memory().unwrap())
    }

    fn snapshot(qty: f64) -> RecordSnapshot {
        let mut snapshot = RecordSnapshot::default();
        snapshot
            .properties
            .insert(PropertyName::new("qty").unwrap(), PropertyValue::Number(qty));
        snapshot
    }

    #[test]
    fn save_appends_in_sequence_and_update_keeps_position() {
        let repo = repo();
        let session = SessionContext::system();
        let first = RecordRef::new("a");
        let second = RecordRef::new("b");

        repo.save("order", &second, &snapshot(1.0), &session).unwrap();
        repo.save("order", &first, &snapshot(2.0), &session).unwrap();
        repo.save("order", &second, &snapshot(3.0), &session).unwrap();

        assert_eq!(repo.list_refs("order").unwrap(), vec![second.clone(), first]);
        assert_eq!(repo.load("order", &second).unwrap().unwrap(), snapshot(3.0));
        assert_eq!(repo.save_count("order", &second).unwrap(), 2);
    }

    #[test]
    fn windows_do_not_see_each_other() {
        let repo = repo();
        repo.save("order", &RecordRef::new("a"), &snapshot(1.0), &SessionContext::system())
            .unwrap();
        assert!(repo.list_refs("invoice").unwrap().is_empty());
        assert!(repo.load("invoice", &RecordRef::new("a")).unwrap().is_none());
    }

    #[test]
    fn corrupt_payload_is_reported_not_masked() {
        let repo = repo();
        repo.connection()
            .execute(
                "INSERT INTO records (window_id, record_ref, seq, payload) VALUES (?1, ?2, 1, ?3);",
                params!["order", "bad", "{not json"],
            )
            .unwrap();

        let err = repo.load("order", &RecordRef::new("bad")).unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(_)));
    }

    #[test]
    fn failed_audit_insert_rolls_back_record_row() {
        let repo = repo();
        repo.connection()
            .execute_batch("DROP TABLE record_saves;")
            .unwrap();

        let record = RecordRef::new("r9");
        let result = repo.save("order", &record, &snapshot(1.0), &SessionContext::system());

        assert!(result.is_err());
        assert!(repo.load("order", &record).unwrap().is_none());
        assert!(repo.list_refs("order").unwrap().is_empty());
    }

    #[test]
    fn save_records_session_identity() {
        let repo = repo();
        let session = SessionContext::new(1000000, 1000001, "sales-clerk");
        repo.save("order", &RecordRef::new("a"), &snapshot(1.0), &session)
            .unwrap();

        let (client, updated_by): (i64, String) = repo
            .connection()
            .query_row(
                "SELECT client_id, updated_by FROM records WHERE record_ref = 'a';",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(client, 1000000);
        assert_eq!(updated_by, "sales-clerk");
    }
}
