use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::store::StoreError;

/// Pool of read-only connections, checked out per operation.
///
/// A checkout returns a guard that hands the connection back on drop. When no
/// idle connection is available a new one is opened, so readers never wait on
/// each other.
pub(crate) struct ConnectionPool {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
}

impl ConnectionPool {
    pub(crate) fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Check out a reader connection.
    pub(crate) fn get(&self) -> Result<PooledConnection<'_>, StoreError> {
        let conn = match self.idle.lock().pop() {
            Some(conn) => conn,
            None => open_reader(&self.path)?,
        };
        Ok(PooledConnection {
            pool: self,
            conn: Some(conn),
        })
    }
}

fn open_reader(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    // Readers must never write; the single writer lives on its own connection
    conn.pragma_update(None, "query_only", true)?;
    Ok(conn)
}

/// Scoped reader checkout; the connection returns to the pool on drop.
pub(crate) struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.idle.lock().push(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_checkout_returns_connection_to_pool() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("pool.db");
        Connection::open(&path).expect("create db");

        let pool = ConnectionPool::new(&path);
        {
            let conn = pool.get().expect("checkout");
            let one: i64 = conn.query_row("SELECT 1", [], |r| r.get(0)).expect("query");
            assert_eq!(one, 1);
        }
        assert_eq!(pool.idle.lock().len(), 1);

        // Reuses the idle connection instead of opening another
        let _conn = pool.get().expect("checkout again");
        assert_eq!(pool.idle.lock().len(), 0);
    }

    #[test]
    fn test_reader_connections_reject_writes() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("pool.db");
        Connection::open(&path).expect("create db");

        let pool = ConnectionPool::new(&path);
        let conn = pool.get().expect("checkout");
        let result = conn.execute("CREATE TABLE t (x INTEGER)", []);
        assert!(result.is_err());
    }
}
