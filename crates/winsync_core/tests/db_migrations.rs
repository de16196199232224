use rusqlite::{params, Connection};
use winsync_core::db::migrations::latest_version;
use winsync_core::db::{open_db, open_db_in_memory, DbError};
use winsync_core::{RecordRef, RecordRepository, RecordSnapshot, SessionContext, SqliteRecordRepository};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "records");
    assert_table_exists(&conn, "record_saves");
}

#[test]
fn opening_same_database_twice_keeps_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("winsync.db");

    let repository = SqliteRecordRepository::new(open_db(&path).unwrap());
    repository
        .save(
            "sales_order",
            &RecordRef::new("r1"),
            &RecordSnapshot::default(),
            &SessionContext::system(),
        )
        .unwrap();
    drop(repository);

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    let repository = SqliteRecordRepository::new(conn);
    assert_eq!(
        repository.list_refs("sales_order").unwrap(),
        vec![RecordRef::new("r1")]
    );
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn save_audit_rows_require_an_existing_record() {
    let conn = open_db_in_memory().unwrap();
    let result = conn.execute(
        "INSERT INTO record_saves (window_id, record_ref, client_id, org_id, saved_by)
         VALUES (?1, ?2, 0, 0, 'system');",
        params!["sales_order", "missing"],
    );
    assert!(result.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
