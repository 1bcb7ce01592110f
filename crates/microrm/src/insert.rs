//! INSERT builder, with optional dialect-specific upsert.

use crate::accessor::ValueAccessor;
use crate::builder::SqlBuilder;
use crate::dialect::Upsert;
use crate::error::{OrmError, OrmResult};
use crate::expr::Assignable;
use crate::model::{Entity, Field};
use crate::query::{Query, QueryBuilder, QueryType};
use crate::row::ExecResult;
use crate::session::{self, Session};

/// `INSERT INTO ... VALUES ...` for one or more `T`.
///
/// ```ignore
/// Inserter::<User>::new(&db)
///     .values([alice, bob])
///     .on_duplicate_key()
///     .conflict_columns(["id"])
///     .update([col("first_name").into(), assign("age", 18).into()])
///     .exec()
///     .await?;
/// ```
pub struct Inserter<'s, T> {
    session: &'s dyn Session,
    values: Vec<T>,
    columns: Vec<String>,
    upsert: Option<Upsert>,
}

impl<'s, T: Entity> Inserter<'s, T> {
    pub fn new(session: &'s dyn Session) -> Self {
        Self {
            session,
            values: Vec::new(),
            columns: Vec::new(),
            upsert: None,
        }
    }

    /// Rows to insert, appended to any added before.
    pub fn values(mut self, values: impl IntoIterator<Item = T>) -> Self {
        self.values.extend(values);
        self
    }

    /// Insert only these entity fields. Defaults to every field.
    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Start the upsert part of the statement.
    pub fn on_duplicate_key(self) -> UpsertBuilder<'s, T> {
        UpsertBuilder {
            inserter: self,
            conflict_columns: Vec::new(),
        }
    }

    pub async fn exec(&self) -> OrmResult<ExecResult> {
        if self.values.is_empty() {
            return Err(OrmError::InsertZeroRow);
        }
        session::exec::<T>(self.session, QueryType::Insert, self).await
    }
}

impl<T: Entity> QueryBuilder for Inserter<'_, T> {
    fn build(&self) -> OrmResult<Query> {
        if self.values.is_empty() {
            return Err(OrmError::InsertZeroRow);
        }
        let core = self.session.core();
        let model = core.registry().get::<T>()?;
        let mut b = SqlBuilder::new(&model, core.dialect());

        let fields: Vec<&Field> = if self.columns.is_empty() {
            model.fields().iter().collect()
        } else {
            self.columns
                .iter()
                .map(|name| {
                    model
                        .field(name)
                        .ok_or_else(|| OrmError::unknown_field(name.as_str()))
                })
                .collect::<OrmResult<_>>()?
        };

        b.push_str("INSERT INTO ");
        b.build_table(None);
        b.push_str(" (");
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                b.push(',');
            }
            b.quote(&field.column_name);
        }
        b.push_str(") VALUES ");

        let accessor = core.accessor().accessor(&model);
        for (i, entity) in self.values.iter().enumerate() {
            if i > 0 {
                b.push(',');
            }
            b.push('(');
            for (j, field) in fields.iter().enumerate() {
                if j > 0 {
                    b.push(',');
                }
                let value = accessor.field(entity, field.field_name)?;
                b.push_arg(value);
            }
            b.push(')');
        }

        if let Some(upsert) = &self.upsert {
            core.dialect().build_upsert(&mut b, upsert)?;
        }

        Ok(b.finish())
    }
}

/// Collects the conflict target and update list of an upsert.
pub struct UpsertBuilder<'s, T> {
    inserter: Inserter<'s, T>,
    conflict_columns: Vec<String>,
}

impl<'s, T: Entity> UpsertBuilder<'s, T> {
    /// Conflict target (entity field names). Ignored by MySQL.
    pub fn conflict_columns<S: Into<String>>(
        mut self,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.conflict_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// What to update on conflict; returns the finished insert.
    pub fn update<A: Into<Assignable>>(
        self,
        assigns: impl IntoIterator<Item = A>,
    ) -> Inserter<'s, T> {
        let mut inserter = self.inserter;
        inserter.upsert = Some(Upsert {
            conflict_columns: self.conflict_columns,
            assigns: assigns.into_iter().map(Into::into).collect(),
        });
        inserter
    }
}
