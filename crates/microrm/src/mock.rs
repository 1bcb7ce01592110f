//! In-memory scripted driver for tests.
//!
//! Results are queued with the `expect_*` methods and consumed in order by
//! `query` / `execute`, on the plain connection and inside transactions
//! alike. Every statement and transaction event is recorded.
//!
//! ```ignore
//! let mock = MockDriver::new();
//! mock.expect_rows(&["id", "first_name"], vec![vec![1i64.into(), "Tom".into()]]);
//! let db = Db::new(mock.clone());
//! let user = Selector::<User>::new(&db).get().await?;
//! assert_eq!(mock.statements()[0].sql, "SELECT * FROM `user`;");
//! ```

use crate::driver::{Driver, DriverTx, TransactionOptions};
use crate::error::{OrmError, OrmResult};
use crate::query::Query;
use crate::row::{ExecResult, Row};
use crate::value::Value;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Expectation {
    Rows {
        columns: Arc<[String]>,
        rows: Vec<Vec<Value>>,
    },
    Exec(ExecResult),
    Error(String),
}

#[derive(Debug, Default)]
struct MockState {
    expectations: VecDeque<Expectation>,
    statements: Vec<Query>,
    events: Vec<String>,
    begin_error: Option<String>,
    commit_error: Option<String>,
    rollback_error: Option<String>,
    delay: Option<Duration>,
}

/// Scripted [`Driver`]. Clones share the same script and log.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a result set. An empty `rows` is a query that matched nothing.
    pub fn expect_rows(&self, columns: &[&str], rows: Vec<Vec<Value>>) -> &Self {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.lock()
            .expectations
            .push_back(Expectation::Rows { columns, rows });
        self
    }

    /// Queue the outcome of an exec.
    pub fn expect_exec(&self, result: ExecResult) -> &Self {
        self.lock().expectations.push_back(Expectation::Exec(result));
        self
    }

    /// Queue a driver error for the next statement.
    pub fn expect_error(&self, message: impl Into<String>) -> &Self {
        self.lock()
            .expectations
            .push_back(Expectation::Error(message.into()));
        self
    }

    pub fn fail_begin(&self, message: impl Into<String>) -> &Self {
        self.lock().begin_error = Some(message.into());
        self
    }

    pub fn fail_commit(&self, message: impl Into<String>) -> &Self {
        self.lock().commit_error = Some(message.into());
        self
    }

    pub fn fail_rollback(&self, message: impl Into<String>) -> &Self {
        self.lock().rollback_error = Some(message.into());
        self
    }

    /// Delay every statement, e.g. to exercise query timeouts.
    pub fn with_delay(&self, delay: Duration) -> &Self {
        self.lock().delay = Some(delay);
        self
    }

    /// Statements received so far, in order.
    pub fn statements(&self) -> Vec<Query> {
        self.lock().statements.clone()
    }

    /// `BEGIN ...` / `COMMIT` / `ROLLBACK` and the SQL of each statement, in order.
    pub fn events(&self) -> Vec<String> {
        self.lock().events.clone()
    }

    /// Expectations not consumed yet.
    pub fn pending(&self) -> usize {
        self.lock().expectations.len()
    }

    fn record(&self, sql: &str, args: &[Value]) -> (Option<Expectation>, Option<Duration>) {
        let mut state = self.lock();
        state.statements.push(Query::new(sql, args.to_vec()));
        state.events.push(sql.to_string());
        (state.expectations.pop_front(), state.delay)
    }

    async fn next(&self, sql: &str, args: &[Value]) -> OrmResult<Expectation> {
        let (expectation, delay) = self.record(sql, args);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match expectation {
            Some(Expectation::Error(message)) => Err(OrmError::driver(message)),
            Some(expectation) => Ok(expectation),
            None => Err(OrmError::driver(format!("unexpected statement: {sql}"))),
        }
    }

    async fn run_query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        match self.next(sql, args).await? {
            Expectation::Rows { columns, rows } => rows
                .into_iter()
                .map(|values| Row::new(Arc::clone(&columns), values))
                .collect(),
            other => Err(OrmError::driver(format!(
                "expected a query, got {other:?} for {sql}"
            ))),
        }
    }

    async fn run_execute(&self, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
        match self.next(sql, args).await? {
            Expectation::Exec(result) => Ok(result),
            other => Err(OrmError::driver(format!(
                "expected an exec, got {other:?} for {sql}"
            ))),
        }
    }

    fn event(&self, name: &str, error: impl FnOnce(&mut MockState) -> Option<String>) -> OrmResult<()> {
        let mut state = self.lock();
        state.events.push(name.to_string());
        match error(&mut *state) {
            Some(message) => Err(OrmError::driver(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        self.run_query(sql, args).await
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
        self.run_execute(sql, args).await
    }

    async fn begin(&self, options: &TransactionOptions) -> OrmResult<Box<dyn DriverTx>> {
        self.event(&options.begin_sql(), |s| s.begin_error.clone())?;
        Ok(Box::new(MockTx {
            driver: self.clone(),
        }))
    }
}

struct MockTx {
    driver: MockDriver,
}

#[async_trait]
impl DriverTx for MockTx {
    async fn query(&mut self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        self.driver.run_query(sql, args).await
    }

    async fn execute(&mut self, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
        self.driver.run_execute(sql, args).await
    }

    async fn commit(self: Box<Self>) -> OrmResult<()> {
        self.driver.event("COMMIT", |s| s.commit_error.clone())
    }

    async fn rollback(self: Box<Self>) -> OrmResult<()> {
        self.driver.event("ROLLBACK", |s| s.rollback_error.clone())
    }

    fn rollback_on_drop(self: Box<Self>) {
        if let Err(err) = self.driver.event("ROLLBACK", |s| s.rollback_error.clone()) {
            tracing::warn!(target: "microrm", error = %err, "rollback of dropped transaction failed");
        }
    }
}
