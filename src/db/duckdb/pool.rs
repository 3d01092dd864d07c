//! Writer connection pool
//!
//! DuckDB allows one database instance per file in a process, so writer
//! connections are cloned from the session connection instead of opening the
//! file again. Clones share the instance and see each other's commits.

use duckdb::Connection;
use parking_lot::Mutex;
use r2d2::{ManageConnection, Pool};
use std::sync::Arc;

pub type WriterPool = Pool<SessionCloneManager>;

/// Hands out connections cloned from a shared root connection
pub struct SessionCloneManager {
    root: Arc<Mutex<Connection>>,
}

impl SessionCloneManager {
    pub fn new(root: Arc<Mutex<Connection>>) -> Self {
        Self { root }
    }
}

impl ManageConnection for SessionCloneManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Connection, duckdb::Error> {
        self.root.lock().try_clone()
    }

    fn is_valid(&self, conn: &mut Connection) -> Result<(), duckdb::Error> {
        conn.execute_batch("SELECT 1")
    }

    fn has_broken(&self, _conn: &mut Connection) -> bool {
        false
    }
}

/// Build a pool of at most `max_size` writer connections.
///
/// Connections are opened lazily so that construction never waits on the
/// session lock.
pub fn open_writer_pool(
    root: Arc<Mutex<Connection>>,
    max_size: u32,
) -> Result<WriterPool, r2d2::Error> {
    Pool::builder()
        .max_size(max_size)
        .min_idle(Some(0))
        .build(SessionCloneManager::new(root))
}
