//! Invocation records.
//!
//! One row per handler attempt, plus one row per unrouted event. Raw SQL with
//! rusqlite, no ORM.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed,
    TimedOut,
    Unrouted,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Succeeded => "succeeded",
            Outcome::Failed => "failed",
            Outcome::TimedOut => "timed_out",
            Outcome::Unrouted => "unrouted",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "succeeded" => Ok(Outcome::Succeeded),
            "failed" => Ok(Outcome::Failed),
            "timed_out" => Ok(Outcome::TimedOut),
            "unrouted" => Ok(Outcome::Unrouted),
            _ => bail!("Invalid invocation outcome: {}", s),
        }
    }
}

/// A row to insert.
#[derive(Debug, Clone)]
pub struct NewInvocation {
    pub invocation_id: String,
    pub function: String,
    /// Short description of the triggering event, e.g. `inbound/a.mp3`.
    pub trigger: String,
    pub attempt: u32,
    pub outcome: Outcome,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRecord {
    pub id: i64,
    pub invocation_id: String,
    pub function: String,
    pub trigger: String,
    pub attempt: u32,
    pub outcome: Outcome,
    pub error: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

impl InvocationRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let outcome: String = row.get(5)?;
        Ok(Self {
            id: row.get(0)?,
            invocation_id: row.get(1)?,
            function: row.get(2)?,
            trigger: row.get(3)?,
            attempt: row.get(4)?,
            outcome: outcome.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
            error: row.get(6)?,
            started_at: row.get(7)?,
            finished_at: row.get(8)?,
        })
    }
}

pub struct InvocationRepository;

impl InvocationRepository {
    pub fn insert(conn: &Connection, invocation: &NewInvocation) -> Result<i64> {
        conn.execute(
            "INSERT INTO invocations \
             (invocation_id, function, trigger_event, attempt, outcome, error, started_at, finished_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                invocation.invocation_id,
                invocation.function,
                invocation.trigger,
                invocation.attempt,
                invocation.outcome.as_str(),
                invocation.error,
                invocation.started_at.to_rfc3339(),
                invocation.finished_at.to_rfc3339(),
            ],
        )
        .context("Failed to insert invocation")?;

        Ok(conn.last_insert_rowid())
    }

    /// List invocations, newest first.
    pub fn list(conn: &Connection, limit: usize) -> Result<Vec<InvocationRecord>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, invocation_id, function, trigger_event, attempt, outcome, error, \
                 started_at, finished_at \
                 FROM invocations ORDER BY started_at DESC, id DESC LIMIT ?1",
            )
            .context("Failed to prepare invocations list query")?;

        let records = stmt
            .query_map(params![limit as i64], InvocationRecord::from_row)
            .context("Failed to query invocations")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to map invocations")?;

        Ok(records)
    }

    pub fn count_by_outcome(conn: &Connection, outcome: Outcome) -> Result<i64> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM invocations WHERE outcome = ?1",
                params![outcome.as_str()],
                |row| row.get(0),
            )
            .context("Failed to count invocations")?;

        Ok(count)
    }
}
