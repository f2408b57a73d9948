//! Reference relational-store adapter.
//!
//! The relational store itself is out of scope (§1); this wraps a single
//! `rusqlite::Connection` behind a `tokio::sync::Mutex` and runs each
//! operation via `spawn_blocking`, in the teacher's synchronous
//! connection-per-handle style, generalized to be callable from async axum
//! handlers and workers. Domain crates build their repository traits on
//! top of `SqlitePool::with_conn`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::errors::RepositoryError;

#[derive(Clone)]
pub struct SqlitePool {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePool {
    pub fn open(path: &Path) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn apply_schema(&self, schema: &'static str) -> Result<(), RepositoryError> {
        let guard = self.conn.lock().expect("sqlite pool poisoned");
        guard.execute_batch(schema)?;
        Ok(())
    }

    /// Run a closure against the connection on a blocking thread, so async
    /// handlers never block the tokio runtime on synchronous sqlite calls.
    pub async fn with_conn<F, R>(&self, f: F) -> Result<R, RepositoryError>
    where
        F: FnOnce(&Connection) -> Result<R, RepositoryError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().expect("sqlite pool poisoned");
            f(&guard)
        })
        .await
        .map_err(|e| RepositoryError::Internal(e.to_string()))?
    }

    /// Cheap reachability probe for `/health` (§6 "Reports DB ... reachability
    /// and latency").
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT 1", [], |_| Ok(()))?))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn applies_schema_and_runs_queries() {
        let pool = SqlitePool::open_in_memory().unwrap();
        pool.apply_schema("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL);")
            .unwrap();
        pool.with_conn(|conn| {
            conn.execute("INSERT INTO t (name) VALUES (?1)", ["a"])?;
            Ok(())
        })
        .await
        .unwrap();
        let count: i64 = pool
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
