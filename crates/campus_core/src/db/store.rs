//! Thread-safe SQLite store handle with a small idle-connection pool.
//!
//! # Responsibility
//! - Own the database path and hand out migrated connections.
//! - Let concurrent cohort work run each task on its own connection.
//!
//! # Invariants
//! - Every pooled connection went through `open_db` bootstrap.
//! - At most `MAX_IDLE_CONNECTIONS` idle connections are retained.

use super::open::open_db;
use super::DbResult;
use log::{info, warn};
use rusqlite::Connection;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const MAX_IDLE_CONNECTIONS: usize = 8;

/// Shared handle over one SQLite database file.
pub struct SqliteStore {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
}

impl SqliteStore {
    /// Opens the database file, applying migrations once up front.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let first = open_db(&path)?;
        info!(
            "event=store_open module=db status=ok path={}",
            path.display()
        );
        Ok(Self {
            path,
            idle: Mutex::new(vec![first]),
        })
    }

    /// Database file backing this store.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Borrows a connection; it returns to the pool on drop.
    pub fn checkout(&self) -> DbResult<PooledConnection<'_>> {
        let reused = self.lock_idle().pop();
        let conn = match reused {
            Some(conn) => conn,
            None => open_db(&self.path)?,
        };
        Ok(PooledConnection {
            store: self,
            conn: Some(conn),
        })
    }

    fn checkin(&self, conn: Connection) {
        let mut idle = self.lock_idle();
        if idle.len() < MAX_IDLE_CONNECTIONS {
            idle.push(conn);
        }
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<Connection>> {
        match self.idle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("event=store_pool module=db status=recovered reason=poisoned_lock");
                poisoned.into_inner()
            }
        }
    }
}

/// Connection borrowed from a [`SqliteStore`].
pub struct PooledConnection<'store> {
    store: &'store SqliteStore,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        match self.conn.as_ref() {
            Some(conn) => conn,
            None => unreachable!("pooled connection is only taken in drop"),
        }
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.store.checkin(conn);
        }
    }
}
