use std::{
    mem::ManuallyDrop,
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use rusqlite::{Connection, OpenFlags};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{AppError, AppResult};

/// Bounded set of SQLite connections to one database file.
///
/// A request first waits for a permit (async), then checks a connection out
/// on a blocking thread. The guard hands the connection back on drop, so it
/// is released on every exit path of the request.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    db_path: PathBuf,
    busy_timeout_ms: u64,
    idle: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
    max_size: usize,
}

impl ConnectionPool {
    pub fn new(db_path: &Path, max_size: usize, busy_timeout_ms: u64) -> AppResult<Self> {
        if max_size == 0 {
            return Err(AppError::validation("pool size must be at least 1"));
        }
        Ok(Self {
            inner: Arc::new(PoolInner {
                db_path: absolute(db_path)?,
                busy_timeout_ms,
                idle: Mutex::new(Vec::with_capacity(max_size)),
                permits: Arc::new(Semaphore::new(max_size)),
                max_size,
            }),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.inner.db_path
    }

    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    /// Waits until fewer than `max_size` connections are checked out.
    pub async fn permit(&self) -> AppResult<OwnedSemaphorePermit> {
        self.inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::Internal("connection pool closed".into()))
    }

    /// Blocking: reuses an idle connection or opens a fresh one.
    pub fn checkout(&self, permit: OwnedSemaphorePermit) -> AppResult<PooledConnection> {
        let idle = {
            let mut guard = self
                .inner
                .idle
                .lock()
                .map_err(|_| AppError::Internal("poisoned lock".into()))?;
            guard.pop()
        };
        let conn = match idle {
            Some(c) => c,
            None => open_conn(&self.inner.db_path, self.inner.busy_timeout_ms)?,
        };
        Ok(PooledConnection {
            conn: ManuallyDrop::new(conn),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    #[cfg(test)]
    fn idle_len(&self) -> usize {
        self.inner.idle.lock().map(|g| g.len()).unwrap_or(0)
    }
}

/// Connection exclusively owned by one request until dropped.
pub struct PooledConnection {
    conn: ManuallyDrop<Connection>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        // SAFETY: `conn` is taken exactly once, here, and never touched again.
        let conn = unsafe { ManuallyDrop::take(&mut self.conn) };
        // A connection still inside a transaction is not reusable.
        if !conn.is_autocommit() {
            tracing::warn!(path=%self.pool.db_path.display(), "discarding connection with open transaction");
            return;
        }
        if let Ok(mut idle) = self.pool.idle.lock() {
            if idle.len() < self.pool.max_size {
                idle.push(conn);
            }
        }
    }
}

fn open_conn(path: &Path, busy_timeout_ms: u64) -> AppResult<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
    let conn = Connection::open_with_flags(path, flags)?;
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "wal", |r| r.get(0))?;
    tracing::debug!(path=%path.display(), journal_mode=%mode, "opened connection");
    Ok(conn)
}

fn absolute(path: &Path) -> AppResult<PathBuf> {
    // The file may not exist yet, so no canonicalize.
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connections_are_returned_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::new(&dir.path().join("pool.db"), 2, 1_000).unwrap();

        let permit = pool.permit().await.unwrap();
        let conn = pool.checkout(permit).unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();
        assert_eq!(pool.idle_len(), 0);
        drop(conn);
        assert_eq!(pool.idle_len(), 1);

        let permit = pool.permit().await.unwrap();
        let conn = pool.checkout(permit).unwrap();
        assert_eq!(pool.idle_len(), 0);
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn checkouts_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::new(&dir.path().join("pool.db"), 1, 1_000).unwrap();

        let first = pool.checkout(pool.permit().await.unwrap()).unwrap();
        let waiting = tokio::time::timeout(Duration::from_millis(50), pool.permit()).await;
        assert!(waiting.is_err());
        drop(first);
        assert!(pool.permit().await.is_ok());
    }

    #[tokio::test]
    async fn open_transaction_discards_connection() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::new(&dir.path().join("pool.db"), 1, 1_000).unwrap();
        let conn = pool.checkout(pool.permit().await.unwrap()).unwrap();
        conn.execute_batch("BEGIN").unwrap();
        drop(conn);
        assert_eq!(pool.idle_len(), 0);
    }

    #[test]
    fn zero_sized_pool_is_rejected() {
        assert!(ConnectionPool::new(Path::new("x.db"), 0, 1_000).is_err());
    }
}
