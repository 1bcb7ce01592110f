//! Database client boundary.
//!
//! microrm never speaks a wire protocol itself: it hands SQL text and
//! positional [`Value`]s to a [`Driver`] and gets [`Row`]s or an
//! [`ExecResult`] back. See `PgDriver` (feature `postgres`) and
//! [`MockDriver`](crate::mock::MockDriver).

use crate::error::OrmResult;
use crate::row::{ExecResult, Row};
use crate::value::Value;
use async_trait::async_trait;

/// A connection (or pool) able to run statements and open transactions.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>>;

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<ExecResult>;

    /// Start a transaction. The returned handle owns its connection until it
    /// is committed or rolled back.
    async fn begin(&self, options: &TransactionOptions) -> OrmResult<Box<dyn DriverTx>>;
}

/// An open transaction on a driver connection.
#[async_trait]
pub trait DriverTx: Send + 'static {
    async fn query(&mut self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>>;

    async fn execute(&mut self, sql: &str, args: &[Value]) -> OrmResult<ExecResult>;

    async fn commit(self: Box<Self>) -> OrmResult<()>;

    async fn rollback(self: Box<Self>) -> OrmResult<()>;

    /// Called when the owning [`Tx`](crate::Tx) is dropped while still open,
    /// e.g. because the future running it was cancelled. Must not block; the
    /// connection may only be reused after the rollback has been issued.
    fn rollback_on_drop(self: Box<Self>);
}

/// Isolation level requested when a transaction starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionIsolation {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl TransactionIsolation {
    pub fn as_sql(self) -> &'static str {
        match self {
            TransactionIsolation::ReadUncommitted => "READ UNCOMMITTED",
            TransactionIsolation::ReadCommitted => "READ COMMITTED",
            TransactionIsolation::RepeatableRead => "REPEATABLE READ",
            TransactionIsolation::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options for [`Db::begin_tx_with`](crate::Db::begin_tx_with) and friends.
///
/// The default is the server's default isolation level, read-write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    pub isolation_level: Option<TransactionIsolation>,
    pub read_only: bool,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation_level(mut self, level: TransactionIsolation) -> Self {
        self.isolation_level = Some(level);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// `BEGIN` with the requested modes, e.g.
    /// `BEGIN ISOLATION LEVEL SERIALIZABLE, READ ONLY`.
    pub fn begin_sql(&self) -> String {
        let mut modes = Vec::new();
        if let Some(level) = self.isolation_level {
            modes.push(format!("ISOLATION LEVEL {}", level.as_sql()));
        }
        if self.read_only {
            modes.push("READ ONLY".to_string());
        }
        if modes.is_empty() {
            "BEGIN".to_string()
        } else {
            format!("BEGIN {}", modes.join(", "))
        }
    }
}
