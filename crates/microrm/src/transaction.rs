//! Transactions: the [`Tx`] session and the commit/rollback helpers.
//!
//! [`Db::do_tx`] commits when the body returns `Ok`, rolls back when it
//! returns `Err` or panics, and reports a failed rollback together with the
//! error that caused it. [`Db::do_tx_ambient`] reuses the transaction already
//! running in the current task instead of opening a nested one. A `Tx`
//! dropped while still open, e.g. when the future driving it is cancelled,
//! is rolled back.
//!
//! # Example
//!
//! ```ignore
//! use microrm::{Db, Inserter, OrmResult};
//!
//! # async fn demo(db: &Db) -> OrmResult<()> {
//! db.do_tx(|tx| async move {
//!     Inserter::<User>::new(tx.as_ref()).values([user]).exec().await?;
//!     Ok(())
//! })
//! .await?;
//! # Ok(()) }
//! ```

use crate::driver::{DriverTx, TransactionOptions};
use crate::error::{OrmError, OrmResult};
use crate::query::Query;
use crate::row::{ExecResult, Row};
use crate::session::{Core, Db, Session};
use async_trait::async_trait;
use futures_util::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

tokio::task_local! {
    static AMBIENT_TX: Arc<Tx>;
}

/// Runs the given block inside a transaction opened on `$db`.
///
/// - Begins a transaction via `$db.begin_tx().await`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`; a failed rollback becomes `OrmError::FailedToRollback`.
///
/// The block must evaluate to `microrm::OrmResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($db:expr, $tx:ident, $body:block) => {{
        let $tx = ($db).begin_tx().await?;

        let __microrm_tx_body_result: $crate::OrmResult<_> = async { $body }.await;
        match __microrm_tx_body_result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::OrmError::failed_to_rollback(
                    error,
                    rollback_err,
                    false,
                )),
            },
        }
    }};
}

/// Like [`transaction!`], with [`TransactionOptions`](crate::TransactionOptions)
/// for the `BEGIN`.
#[macro_export]
macro_rules! transaction_with {
    ($db:expr, $tx:ident, $opts:expr, $body:block) => {{
        let $tx = ($db).begin_tx_with($opts).await?;

        let __microrm_tx_body_result: $crate::OrmResult<_> = async { $body }.await;
        match __microrm_tx_body_result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::OrmError::failed_to_rollback(
                    error,
                    rollback_err,
                    false,
                )),
            },
        }
    }};
}

/// A transaction-bound session.
///
/// Statements issued through one `Tx` run in issuance order on the
/// transaction's connection. After `commit` or `rollback` every further
/// statement fails with `OrmError::TransactionDone`.
pub struct Tx {
    core: Core,
    inner: Mutex<Option<Box<dyn DriverTx>>>,
    done: AtomicBool,
}

impl Tx {
    pub(crate) fn new(core: Core, inner: Box<dyn DriverTx>) -> Self {
        Self {
            core,
            inner: Mutex::new(Some(inner)),
            done: AtomicBool::new(false),
        }
    }

    /// Whether the transaction has been committed or rolled back.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    async fn take(&self) -> OrmResult<Box<dyn DriverTx>> {
        let inner = self.inner.lock().await.take();
        self.done.store(true, Ordering::Release);
        inner.ok_or(OrmError::TransactionDone)
    }

    pub async fn commit(&self) -> OrmResult<()> {
        self.take().await?.commit().await
    }

    pub async fn rollback(&self) -> OrmResult<()> {
        let result = self.take().await?.rollback().await;
        if let Err(err) = &result {
            tracing::warn!(target: "microrm", error = %err, "transaction rollback failed");
        }
        result
    }
}

impl Drop for Tx {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.get_mut().take() {
            tracing::debug!(target: "microrm", "open transaction dropped, rolling back");
            inner.rollback_on_drop();
        }
    }
}

impl fmt::Debug for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tx")
            .field("core", &self.core)
            .field("done", &self.is_done())
            .finish()
    }
}

#[async_trait]
impl Session for Tx {
    fn core(&self) -> &Core {
        &self.core
    }

    async fn query_rows(&self, query: &Query) -> OrmResult<Vec<Row>> {
        tracing::debug!(target: "microrm.sql", sql = %query.sql, params = query.args.len(), "tx query");
        self.core
            .with_timeout(async {
                let mut guard = self.inner.lock().await;
                let tx = guard.as_mut().ok_or(OrmError::TransactionDone)?;
                tx.query(&query.sql, &query.args).await
            })
            .await
    }

    async fn exec_query(&self, query: &Query) -> OrmResult<ExecResult> {
        tracing::debug!(target: "microrm.sql", sql = %query.sql, params = query.args.len(), "tx exec");
        self.core
            .with_timeout(async {
                let mut guard = self.inner.lock().await;
                let tx = guard.as_mut().ok_or(OrmError::TransactionDone)?;
                tx.execute(&query.sql, &query.args).await
            })
            .await
    }
}

/// The transaction running in the current task, if it is still open.
pub fn current_tx() -> Option<Arc<Tx>> {
    AMBIENT_TX
        .try_with(Arc::clone)
        .ok()
        .filter(|tx| !tx.is_done())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Commit or roll back `tx` according to how the body ended.
async fn finish<R>(
    tx: &Tx,
    outcome: Result<OrmResult<R>, Box<dyn Any + Send>>,
) -> OrmResult<R> {
    match outcome {
        // the body may have finished the transaction itself
        Ok(Ok(value)) if tx.is_done() => Ok(value),
        Ok(Ok(value)) => {
            tx.commit().await?;
            Ok(value)
        }
        Ok(Err(err)) if tx.is_done() => Err(err),
        Ok(Err(err)) => match tx.rollback().await {
            Ok(()) => Err(err),
            Err(rollback) => Err(OrmError::failed_to_rollback(err, rollback, false)),
        },
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            if tx.is_done() {
                std::panic::resume_unwind(panic);
            }
            match tx.rollback().await {
                Ok(()) => std::panic::resume_unwind(panic),
                Err(rollback) => Err(OrmError::failed_to_rollback(
                    OrmError::Panicked(message),
                    rollback,
                    true,
                )),
            }
        }
    }
}

impl Db {
    /// Open a transaction.
    pub async fn begin_tx(&self) -> OrmResult<Tx> {
        self.begin_tx_with(TransactionOptions::default()).await
    }

    /// Open a transaction with an isolation level and access mode.
    pub async fn begin_tx_with(&self, options: TransactionOptions) -> OrmResult<Tx> {
        let core = Session::core(self);
        let inner = core.with_timeout(self.driver().begin(&options)).await?;
        Ok(Tx::new(core.clone(), inner))
    }

    /// Run `f` in a new transaction.
    ///
    /// Commits on `Ok`, rolls back on `Err`. A panic in `f` rolls back and
    /// resumes unwinding; if that rollback fails the panic is reported as
    /// `FailedToRollback { panicked: true, .. }` instead.
    pub async fn do_tx<F, Fut, R>(&self, f: F) -> OrmResult<R>
    where
        F: FnOnce(Arc<Tx>) -> Fut,
        Fut: Future<Output = OrmResult<R>>,
    {
        self.do_tx_with(TransactionOptions::default(), f).await
    }

    /// [`do_tx`](Self::do_tx) with explicit [`TransactionOptions`].
    pub async fn do_tx_with<F, Fut, R>(&self, options: TransactionOptions, f: F) -> OrmResult<R>
    where
        F: FnOnce(Arc<Tx>) -> Fut,
        Fut: Future<Output = OrmResult<R>>,
    {
        let tx = Arc::new(self.begin_tx_with(options).await?);
        let body = Arc::clone(&tx);
        let outcome = AssertUnwindSafe(async move { f(body).await })
            .catch_unwind()
            .await;
        finish(&tx, outcome).await
    }

    /// Run `f` in the current task's open transaction, or in a new one that
    /// becomes current for the duration of `f`.
    ///
    /// When an outer transaction is reused, its owner decides commit or
    /// rollback; errors from `f` are returned as they are.
    pub async fn do_tx_ambient<F, Fut, R>(&self, f: F) -> OrmResult<R>
    where
        F: FnOnce(Arc<Tx>) -> Fut,
        Fut: Future<Output = OrmResult<R>>,
    {
        self.do_tx_ambient_with(TransactionOptions::default(), f)
            .await
    }

    /// [`do_tx_ambient`](Self::do_tx_ambient) with explicit
    /// [`TransactionOptions`]. The options only apply when a new transaction
    /// is opened; a reused one keeps the options it was started with.
    pub async fn do_tx_ambient_with<F, Fut, R>(
        &self,
        options: TransactionOptions,
        f: F,
    ) -> OrmResult<R>
    where
        F: FnOnce(Arc<Tx>) -> Fut,
        Fut: Future<Output = OrmResult<R>>,
    {
        if let Some(tx) = current_tx() {
            return f(tx).await;
        }
        let tx = Arc::new(self.begin_tx_with(options).await?);
        let body = Arc::clone(&tx);
        let scoped = AMBIENT_TX.scope(Arc::clone(&tx), async move { f(body).await });
        let outcome = AssertUnwindSafe(scoped).catch_unwind().await;
        finish(&tx, outcome).await
    }
}
