//! SQLite invocation log.

mod init;
mod invocations;
mod journal;

pub use init::{init_db, migrate, open_at};
pub use invocations::{InvocationRecord, InvocationRepository, NewInvocation, Outcome};
pub use journal::InvocationLog;
