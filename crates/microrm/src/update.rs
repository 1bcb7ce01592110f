//! UPDATE builder.

use crate::builder::{Clause, SqlBuilder};
use crate::error::{OrmError, OrmResult};
use crate::expr::{Assignable, Predicate};
use crate::model::Entity;
use crate::query::{Query, QueryBuilder, QueryType};
use crate::row::ExecResult;
use crate::session::{self, Session};
use std::marker::PhantomData;

/// `UPDATE ... SET ... WHERE ...` for entity `T`.
///
/// ```ignore
/// Updater::<User>::new(&db)
///     .set([assign("first_name", "Tom")])
///     .set([raw("`age` = `age` + ?", vec![1.into()])])
///     .where_(col("id").eq(1))
///     .exec()
///     .await?;
/// ```
pub struct Updater<'s, T> {
    session: &'s dyn Session,
    table: Option<String>,
    assigns: Vec<Assignable>,
    wheres: Vec<Predicate>,
    _entity: PhantomData<fn() -> T>,
}

impl<'s, T: Entity> Updater<'s, T> {
    pub fn new(session: &'s dyn Session) -> Self {
        Self {
            session,
            table: None,
            assigns: Vec::new(),
            wheres: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// Update `table` (emitted verbatim) instead of the model's table.
    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Append entries to the SET list.
    pub fn set<A: Into<Assignable>>(mut self, assigns: impl IntoIterator<Item = A>) -> Self {
        self.assigns.extend(assigns.into_iter().map(Into::into));
        self
    }

    /// Add a WHERE predicate; multiple calls are joined with `AND`.
    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.wheres.push(predicate);
        self
    }

    pub async fn exec(&self) -> OrmResult<ExecResult> {
        session::exec::<T>(self.session, QueryType::Update, self).await
    }
}

impl<T: Entity> QueryBuilder for Updater<'_, T> {
    fn build(&self) -> OrmResult<Query> {
        if self.assigns.is_empty() {
            return Err(OrmError::NoUpdatedColumns);
        }
        let core = self.session.core();
        let model = core.registry().get::<T>()?;
        let mut b = SqlBuilder::new(&model, core.dialect());

        b.push_str("UPDATE ");
        b.build_table(self.table.as_deref());
        b.push_str(" SET ");
        for (i, assign) in self.assigns.iter().enumerate() {
            if i > 0 {
                b.push(',');
            }
            match assign {
                Assignable::Assignment(a) => {
                    b.build_column(&a.column)?;
                    b.push_str(" = ");
                    b.push_arg(a.value.clone());
                }
                Assignable::Raw(r) => b.push_raw(r),
                Assignable::Column(c) => {
                    return Err(OrmError::UnsupportedAssignableType(format!(
                        "bare column {:?} in UPDATE SET",
                        c.name()
                    )));
                }
            }
        }

        b.build_predicates("WHERE", &self.wheres, Clause::Where)?;
        Ok(b.finish())
    }
}
