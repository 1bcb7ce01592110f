//! Middleware pipeline around statement execution.
//!
//! Middlewares registered as `[m0, m1, ..., mn]` nest so that `m0` is the
//! outermost: it sees the call first and the result last.
//!
//! # Example
//!
//! ```ignore
//! use microrm::middleware::{Middleware, Next, QueryContext, QueryResult};
//!
//! struct Deny;
//!
//! #[async_trait::async_trait]
//! impl Middleware for Deny {
//!     async fn handle(&self, qc: &QueryContext<'_>, next: Next<'_>) -> QueryResult {
//!         if qc.query_type == microrm::QueryType::Delete {
//!             return QueryResult::err(microrm::OrmError::Other("deletes are disabled".into()));
//!         }
//!         next.run(qc).await
//!     }
//! }
//! ```

mod query_log;


pub use query_log::QueryLog;

use crate::error::{OrmError, OrmResult};
use crate::model::Model;
use crate::query::{Query, QueryBuilder, QueryType};
use crate::row::ExecResult;
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// What a middleware sees about the operation being run.
pub struct QueryContext<'a> {
    pub query_type: QueryType,
    pub model: Arc<Model>,
    builder: &'a dyn QueryBuilder,
    compiled: OnceLock<Query>,
}

impl<'a> QueryContext<'a> {
    pub fn new(query_type: QueryType, model: Arc<Model>, builder: &'a dyn QueryBuilder) -> Self {
        Self {
            query_type,
            model,
            builder,
            compiled: OnceLock::new(),
        }
    }

    pub fn builder(&self) -> &'a dyn QueryBuilder {
        self.builder
    }

    /// The compiled statement. Built on first use and reused for the rest of
    /// the operation.
    pub fn query(&self) -> OrmResult<&Query> {
        if let Some(query) = self.compiled.get() {
            return Ok(query);
        }
        let query = self.builder.build()?;
        Ok(self.compiled.get_or_init(|| query))
    }
}

impl fmt::Debug for QueryContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryContext")
            .field("query_type", &self.query_type)
            .field("table", &self.model.table_name())
            .field("compiled", &self.compiled.get())
            .finish()
    }
}

/// Successful outcome of an operation.
pub enum QueryOutput {
    /// Decoded value of a `get` / `get_multi` (an entity or a `Vec` of them).
    Value(Box<dyn Any + Send>),
    Exec(ExecResult),
}

impl fmt::Debug for QueryOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOutput::Value(_) => f.write_str("Value(..)"),
            QueryOutput::Exec(r) => f.debug_tuple("Exec").field(r).finish(),
        }
    }
}

/// Result flowing back out through the middlewares.
#[derive(Debug)]
pub struct QueryResult {
    pub result: OrmResult<QueryOutput>,
}

impl QueryResult {
    pub fn value<T: Any + Send>(value: T) -> Self {
        Self {
            result: Ok(QueryOutput::Value(Box::new(value))),
        }
    }

    pub fn exec(result: ExecResult) -> Self {
        Self {
            result: Ok(QueryOutput::Exec(result)),
        }
    }

    pub fn err(error: OrmError) -> Self {
        Self { result: Err(error) }
    }

    pub fn is_err(&self) -> bool {
        self.result.is_err()
    }

    pub(crate) fn into_value<T: Any>(self) -> OrmResult<T> {
        match self.result? {
            QueryOutput::Value(value) => value.downcast::<T>().map(|v| *v).map_err(|_| {
                OrmError::Other(format!(
                    "middleware returned a value that is not {}",
                    std::any::type_name::<T>()
                ))
            }),
            QueryOutput::Exec(_) => Err(OrmError::Other(
                "middleware returned an exec result for a query".to_string(),
            )),
        }
    }

    pub(crate) fn into_exec(self) -> OrmResult<ExecResult> {
        match self.result? {
            QueryOutput::Exec(result) => Ok(result),
            QueryOutput::Value(_) => Err(OrmError::Other(
                "middleware returned a value for an exec".to_string(),
            )),
        }
    }
}

/// Cross-cutting logic wrapped around every statement a session runs.
///
/// Call `next.run(qc)` to continue, or return a result without calling it to
/// short-circuit. A forwarded error must be passed on, not swallowed.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, qc: &QueryContext<'_>, next: Next<'_>) -> QueryResult;
}

/// Innermost step of the pipeline: runs the statement.
#[async_trait]
pub(crate) trait Handler: Send + Sync {
    async fn call(&self, qc: &QueryContext<'_>) -> QueryResult;
}

/// The rest of the pipeline after the current middleware.
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(middlewares: &'a [Arc<dyn Middleware>], endpoint: &'a dyn Handler) -> Self {
        Self {
            middlewares,
            endpoint,
        }
    }

    pub async fn run(self, qc: &QueryContext<'_>) -> QueryResult {
        match self.middlewares.split_first() {
            Some((head, rest)) => {
                head.handle(qc, Next::new(rest, self.endpoint)).await
            }
            None => self.endpoint.call(qc).await,
        }
    }
}
