//! Shared handle to the invocation log.

use anyhow::{anyhow, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

use super::{migrate, open_at, InvocationRecord, InvocationRepository, NewInvocation, Outcome};

/// A connection shared between concurrent dispatches.
pub struct InvocationLog {
    conn: Mutex<Connection>,
}

impl InvocationLog {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(open_at(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrate(&conn)?;
        Ok(Self::new(conn))
    }

    pub fn record(&self, invocation: &NewInvocation) -> Result<i64> {
        let conn = self.lock()?;
        InvocationRepository::insert(&conn, invocation)
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<InvocationRecord>> {
        let conn = self.lock()?;
        InvocationRepository::list(&conn, limit)
    }

    pub fn count(&self, outcome: Outcome) -> Result<i64> {
        let conn = self.lock()?;
        InvocationRepository::count_by_outcome(&conn, outcome)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("invocation log lock poisoned"))
    }
}
