//! Connection acquisition and release.
//!
//! The store is an embedded SQLite file, so only a local host is reachable.
//! `connect` and `release` bracket every run; `release` is called on every
//! exit path of `job::run`.

use rusqlite::{Connection, OpenFlags};
use std::path::Path;

use crate::config::ConnectionParams;
use crate::error::MergeError;

const LOCAL_HOSTS: [&str; 4] = ["", "localhost", "127.0.0.1", "::1"];

fn check_host(params: &ConnectionParams) -> Result<(), MergeError> {
    if LOCAL_HOSTS.contains(&params.host.as_str()) {
        Ok(())
    } else {
        Err(MergeError::Connection {
            target: format!("{}@{}/{}", params.user, params.host, params.database),
            source: format!(
                "host '{}' is not reachable; the store is a local database file",
                params.host
            )
            .into(),
        })
    }
}

fn open(params: &ConnectionParams, flags: OpenFlags) -> Result<Connection, MergeError> {
    check_host(params)?;

    // Never create a missing store
    Connection::open_with_flags(Path::new(&params.database), flags).map_err(|source| {
        MergeError::Connection {
            target: params.database.clone(),
            source: Box::new(source),
        }
    })
}

/// Open a read-write connection to an existing database.
/// Logs and returns `ConnectionError` on failure; no retry at this layer.
pub fn connect(params: &ConnectionParams) -> Result<Connection, MergeError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = match open(params, flags) {
        Ok(conn) => conn,
        Err(err) => {
            log::error!("Failed to connect to database: {}", err);
            return Err(err);
        }
    };

    conn.execute_batch(
        "PRAGMA cache_size = -64000;
         PRAGMA temp_store = MEMORY;",
    )
    .map_err(|source| MergeError::Connection {
        target: params.database.clone(),
        source: Box::new(source),
    })?;

    log::info!(
        "Connected to {} as '{}' on {}",
        params.database,
        params.user,
        if params.host.is_empty() { "localhost" } else { params.host.as_str() }
    );
    Ok(conn)
}

/// Open a read-only connection (used by `verify-merge`).
pub fn connect_read_only(params: &ConnectionParams) -> Result<Connection, MergeError> {
    open(
        params,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

/// Roll back whatever transaction is still open on the connection.
/// Committed batches are not affected.
pub fn rollback_pending(conn: &Connection) {
    if conn.is_autocommit() {
        return;
    }
    match conn.execute_batch("ROLLBACK") {
        Ok(()) => log::info!("Rolled back uncommitted work"),
        Err(e) => log::warn!("Rollback failed: {}", e),
    }
}

/// Close the connection. A close failure is logged, never raised, so it cannot
/// mask the error that ended the run.
pub fn release(conn: Connection) {
    match conn.close() {
        Ok(()) => log::info!("Connection closed"),
        Err((_conn, e)) => log::warn!("Failed to close connection cleanly: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remote_host_rejected() {
        let mut params = ConnectionParams::local("/tmp/unused.sqlite3");
        params.host = "db.example.com".to_string();
        let err = connect(&params).unwrap_err();
        assert_eq!(err.kind(), "ConnectionError");
        assert!(err.to_string().contains("db.example.com"));
    }

    #[test]
    fn test_missing_database_not_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.sqlite3");
        let params = ConnectionParams::local(path.to_string_lossy());
        let err = connect(&params).unwrap_err();
        assert_eq!(err.kind(), "ConnectionError");
        assert!(!path.exists());
    }

    #[test]
    fn test_connect_and_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.sqlite3");
        Connection::open(&path).unwrap();

        let conn = connect(&ConnectionParams::local(path.to_string_lossy())).unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER); BEGIN; INSERT INTO t VALUES (1);")
            .unwrap();
        assert!(!conn.is_autocommit());
        rollback_pending(&conn);
        assert!(conn.is_autocommit());
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        release(conn);
    }
}
