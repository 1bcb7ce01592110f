use super::{Middleware, Next, QueryContext, QueryResult};
use crate::value::Value;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::Level;

type LogFn = Arc<dyn Fn(&str, &[Value]) + Send + Sync>;

/// Logs every compiled statement before it runs.
///
/// By default emits a `tracing` event on target `microrm.sql`; a custom
/// callback replaces the event. A statement that fails to compile is not run.
#[derive(Clone)]
pub struct QueryLog {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
    log_fn: Option<LogFn>,
}

impl Default for QueryLog {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
            log_fn: None,
        }
    }
}

impl fmt::Debug for QueryLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryLog")
            .field("level", &self.level)
            .field("max_sql_length", &self.max_sql_length)
            .field("log_fn", &self.log_fn.is_some())
            .finish()
    }
}

fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

impl QueryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    /// Send statements to `f` instead of `tracing`. `f` gets the full SQL.
    pub fn log_fn(mut self, f: impl Fn(&str, &[Value]) + Send + Sync + 'static) -> Self {
        self.log_fn = Some(Arc::new(f));
        self
    }

    fn emit(&self, qc: &QueryContext<'_>, sql: &str, args: &[Value]) {
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        };
        emit_at_level!(
            self.level,
            target: "microrm.sql",
            query_type = qc.query_type.as_str(),
            table = qc.model.table_name(),
            param_count = args.len(),
            sql = %sql,
            args = ?args,
        );
    }
}

#[async_trait]
impl Middleware for QueryLog {
    async fn handle(&self, qc: &QueryContext<'_>, next: Next<'_>) -> QueryResult {
        let query = match qc.query() {
            Ok(query) => query,
            Err(err) => return QueryResult::err(err),
        };
        match &self.log_fn {
            Some(f) => f(&query.sql, &query.args),
            None => self.emit(qc, &query.sql, &query.args),
        }
        next.run(qc).await
    }
}
