//! DELETE builder.

use crate::builder::{Clause, SqlBuilder};
use crate::error::OrmResult;
use crate::expr::Predicate;
use crate::model::Entity;
use crate::query::{Query, QueryBuilder, QueryType};
use crate::row::ExecResult;
use crate::session::{self, Session};
use std::marker::PhantomData;

/// `DELETE FROM ... WHERE ...` for entity `T`.
pub struct Deleter<'s, T> {
    session: &'s dyn Session,
    table: Option<String>,
    wheres: Vec<Predicate>,
    _entity: PhantomData<fn() -> T>,
}

impl<'s, T: Entity> Deleter<'s, T> {
    pub fn new(session: &'s dyn Session) -> Self {
        Self {
            session,
            table: None,
            wheres: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// Delete from `table` (emitted verbatim) instead of the model's table.
    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Add a WHERE predicate; multiple calls are joined with `AND`.
    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.wheres.push(predicate);
        self
    }

    pub async fn exec(&self) -> OrmResult<ExecResult> {
        session::exec::<T>(self.session, QueryType::Delete, self).await
    }
}

impl<T: Entity> QueryBuilder for Deleter<'_, T> {
    fn build(&self) -> OrmResult<Query> {
        let core = self.session.core();
        let model = core.registry().get::<T>()?;
        let mut b = SqlBuilder::new(&model, core.dialect());

        b.push_str("DELETE FROM ");
        b.build_table(self.table.as_deref());
        b.build_predicates("WHERE", &self.wheres, Clause::Where)?;
        Ok(b.finish())
    }
}
