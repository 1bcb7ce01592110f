//! Compiled statements and the builder contract.

use crate::error::OrmResult;
use crate::value::Value;

/// Final SQL text plus its positional arguments.
///
/// `args` is in placeholder emission order; drivers bind positionally.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Query {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// Anything that compiles to a [`Query`].
///
/// `build` never mutates the builder, so calling it more than once yields the
/// same statement.
pub trait QueryBuilder: Send + Sync {
    fn build(&self) -> OrmResult<Query>;
}

/// The type of SQL operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    /// SELECT query
    Select,
    /// INSERT statement (including upserts)
    Insert,
    /// UPDATE statement
    Update,
    /// DELETE statement
    Delete,
    /// Hand-written SQL that is none of the above
    Other,
}

impl QueryType {
    /// Detect the query type from the leading keyword of hand-written SQL.
    pub fn from_sql(sql: &str) -> Self {
        let keyword = sql
            .trim_start()
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or_default();
        if keyword.eq_ignore_ascii_case("SELECT") {
            QueryType::Select
        } else if keyword.eq_ignore_ascii_case("INSERT") {
            QueryType::Insert
        } else if keyword.eq_ignore_ascii_case("UPDATE") {
            QueryType::Update
        } else if keyword.eq_ignore_ascii_case("DELETE") {
            QueryType::Delete
        } else {
            QueryType::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::Select => "SELECT",
            QueryType::Insert => "INSERT",
            QueryType::Update => "UPDATE",
            QueryType::Delete => "DELETE",
            QueryType::Other => "OTHER",
        }
    }
}
