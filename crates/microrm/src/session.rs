//! Sessions: the execution contract shared by [`Db`] and [`Tx`](crate::Tx).
//!
//! Every builder holds a `&dyn Session`, so the same statement code runs
//! against a plain connection or inside a transaction.

use crate::accessor::{AccessorKind, ValueAccessor};
use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::{OrmError, OrmResult};
use crate::middleware::{Handler, Middleware, Next, QueryContext, QueryResult};
use crate::model::{Entity, Registry};
use crate::query::{Query, QueryBuilder, QueryType};
use crate::row::{ExecResult, Row};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Configuration shared by a [`Db`] and every transaction it opens.
#[derive(Clone)]
pub struct Core {
    registry: Arc<Registry>,
    dialect: Dialect,
    accessor: AccessorKind,
    middlewares: Arc<[Arc<dyn Middleware>]>,
    query_timeout: Option<Duration>,
}

impl Core {
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn accessor(&self) -> AccessorKind {
        self.accessor
    }

    pub fn middlewares(&self) -> &[Arc<dyn Middleware>] {
        &self.middlewares
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout
    }

    /// Run `future`, failing with `OrmError::Timeout` once the configured
    /// query timeout elapses. Dropping the future cancels the statement.
    pub(crate) async fn with_timeout<T, F>(&self, future: F) -> OrmResult<T>
    where
        F: Future<Output = OrmResult<T>> + Send,
    {
        match self.query_timeout {
            Some(timeout) => {
                tokio::pin!(future);
                tokio::select! {
                    result = &mut future => result,
                    _ = tokio::time::sleep(timeout) => Err(OrmError::Timeout(timeout)),
                }
            }
            None => future.await,
        }
    }
}

impl fmt::Debug for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Core")
            .field("dialect", &self.dialect)
            .field("accessor", &self.accessor)
            .field("middlewares", &self.middlewares.len())
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

/// Options for [`Db::with_options`].
///
/// Defaults: MySQL dialect, a fresh registry, reflective accessor, no
/// middlewares, no timeout.
#[derive(Clone, Default)]
pub struct DbOptions {
    registry: Option<Arc<Registry>>,
    dialect: Dialect,
    accessor: AccessorKind,
    middlewares: Vec<Arc<dyn Middleware>>,
    query_timeout: Option<Duration>,
}

impl DbOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Share a registry between several `Db`s.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_accessor(mut self, accessor: AccessorKind) -> Self {
        self.accessor = accessor;
        self
    }

    /// Use the raw-memory accessor instead of the reflective one.
    pub fn use_unsafe_accessor(self) -> Self {
        self.with_accessor(AccessorKind::Unsafe)
    }

    /// Append a middleware. The first one added is the outermost.
    pub fn with_middleware(mut self, middleware: impl Middleware) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Set the query timeout duration.
    ///
    /// Statements exceeding this duration are cancelled and return a timeout error.
    /// Default is `None` (no timeout).
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    fn into_core(self) -> Core {
        Core {
            registry: self.registry.unwrap_or_default(),
            dialect: self.dialect,
            accessor: self.accessor,
            middlewares: self.middlewares.into(),
            query_timeout: self.query_timeout,
        }
    }
}

impl fmt::Debug for DbOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbOptions")
            .field("dialect", &self.dialect)
            .field("accessor", &self.accessor)
            .field("middlewares", &self.middlewares.len())
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

/// Uniform execution contract for a plain connection and a transaction.
#[async_trait]
pub trait Session: Send + Sync {
    fn core(&self) -> &Core;

    async fn query_rows(&self, query: &Query) -> OrmResult<Vec<Row>>;

    async fn exec_query(&self, query: &Query) -> OrmResult<ExecResult>;
}

/// A database handle: a driver plus its configuration.
pub struct Db {
    core: Core,
    driver: Arc<dyn Driver>,
}

impl Db {
    pub fn new(driver: impl Driver) -> Self {
        Self::with_options(driver, DbOptions::default())
    }

    pub fn with_options(driver: impl Driver, options: DbOptions) -> Self {
        Self {
            core: options.into_core(),
            driver: Arc::new(driver),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.core.dialect
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.core.registry
    }

    pub(crate) fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db").field("core", &self.core).finish()
    }
}

#[async_trait]
impl Session for Db {
    fn core(&self) -> &Core {
        &self.core
    }

    async fn query_rows(&self, query: &Query) -> OrmResult<Vec<Row>> {
        tracing::debug!(target: "microrm.sql", sql = %query.sql, params = query.args.len(), "query");
        self.core
            .with_timeout(self.driver.query(&query.sql, &query.args))
            .await
    }

    async fn exec_query(&self, query: &Query) -> OrmResult<ExecResult> {
        tracing::debug!(target: "microrm.sql", sql = %query.sql, params = query.args.len(), "exec");
        self.core
            .with_timeout(self.driver.execute(&query.sql, &query.args))
            .await
    }
}

/// What the innermost handler does with the compiled statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminal {
    First,
    All,
    Exec,
}

struct Endpoint<'s, T> {
    session: &'s dyn Session,
    terminal: Terminal,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Endpoint<'_, T> {
    fn decode(&self, qc: &QueryContext<'_>, row: &Row) -> OrmResult<T> {
        let mut entity = T::default();
        self.session
            .core()
            .accessor
            .accessor(&qc.model)
            .set_columns(&mut entity, row)?;
        Ok(entity)
    }

    async fn run(&self, qc: &QueryContext<'_>) -> OrmResult<QueryResult> {
        let query = qc.query()?;
        let result = match self.terminal {
            Terminal::Exec => QueryResult::exec(self.session.exec_query(query).await?),
            Terminal::First => {
                let rows = self.session.query_rows(query).await?;
                let row = rows.first().ok_or(OrmError::NoRows)?;
                QueryResult::value(self.decode(qc, row)?)
            }
            Terminal::All => {
                let rows = self.session.query_rows(query).await?;
                let entities = rows
                    .iter()
                    .map(|row| self.decode(qc, row))
                    .collect::<OrmResult<Vec<T>>>()?;
                QueryResult::value(entities)
            }
        };
        Ok(result)
    }
}

#[async_trait]
impl<T: Entity> Handler for Endpoint<'_, T> {
    async fn call(&self, qc: &QueryContext<'_>) -> QueryResult {
        self.run(qc).await.unwrap_or_else(QueryResult::err)
    }
}

/// Run `builder` for entity `T` through the session's middlewares.
async fn run_pipeline<T: Entity>(
    session: &dyn Session,
    query_type: QueryType,
    builder: &dyn QueryBuilder,
    terminal: Terminal,
) -> OrmResult<QueryResult> {
    let model = session.core().registry.get::<T>()?;
    let qc = QueryContext::new(query_type, model, builder);
    let endpoint = Endpoint::<T> {
        session,
        terminal,
        _entity: PhantomData,
    };
    let middlewares = Arc::clone(&session.core().middlewares);
    Ok(Next::new(&middlewares, &endpoint).run(&qc).await)
}

/// First row of the result decoded as `T`; `NoRows` when empty.
pub(crate) async fn get_one<T: Entity>(
    session: &dyn Session,
    query_type: QueryType,
    builder: &dyn QueryBuilder,
) -> OrmResult<T> {
    run_pipeline::<T>(session, query_type, builder, Terminal::First)
        .await?
        .into_value()
}

/// Every row of the result decoded as `T`.
pub(crate) async fn get_all<T: Entity>(
    session: &dyn Session,
    query_type: QueryType,
    builder: &dyn QueryBuilder,
) -> OrmResult<Vec<T>> {
    run_pipeline::<T>(session, query_type, builder, Terminal::All)
        .await?
        .into_value()
}

/// Execute a statement that returns no rows.
pub(crate) async fn exec<T: Entity>(
    session: &dyn Session,
    query_type: QueryType,
    builder: &dyn QueryBuilder,
) -> OrmResult<ExecResult> {
    run_pipeline::<T>(session, query_type, builder, Terminal::Exec)
        .await?
        .into_exec()
}
