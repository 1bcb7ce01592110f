//! SQL dialects: identifier quoting, placeholder syntax and upsert clauses.

use crate::builder::SqlBuilder;
use crate::error::{OrmError, OrmResult};
use crate::expr::Assignable;
use serde::{Deserialize, Serialize};

/// Supported database products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dialect {
    #[default]
    MySql,
    Sqlite,
    Postgres,
}

/// `ON DUPLICATE KEY` / `ON CONFLICT` part of an insert.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Upsert {
    pub(crate) conflict_columns: Vec<String>,
    pub(crate) assigns: Vec<Assignable>,
}

impl Dialect {
    /// Identifier quote character.
    pub fn quote_char(self) -> char {
        match self {
            Dialect::MySql | Dialect::Sqlite => '`',
            Dialect::Postgres => '"',
        }
    }

    /// Placeholder for the 1-based argument `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${index}"),
        }
    }

    pub(crate) fn build_upsert(self, b: &mut SqlBuilder<'_>, upsert: &Upsert) -> OrmResult<()> {
        if upsert.assigns.is_empty() {
            return Err(OrmError::NoUpdatedColumns);
        }
        match self {
            Dialect::MySql => {
                b.push_str(" ON DUPLICATE KEY UPDATE ");
                self.build_upsert_assigns(b, upsert, |b, column| {
                    b.push_str("VALUES(");
                    b.build_column(column)?;
                    b.push(')');
                    Ok(())
                })
            }
            Dialect::Sqlite | Dialect::Postgres => {
                if upsert.conflict_columns.is_empty() {
                    return Err(OrmError::NoConflictColumns);
                }
                b.push_str(" ON CONFLICT (");
                for (i, column) in upsert.conflict_columns.iter().enumerate() {
                    if i > 0 {
                        b.push(',');
                    }
                    b.build_column(column)?;
                }
                b.push_str(") DO UPDATE SET ");
                self.build_upsert_assigns(b, upsert, |b, column| {
                    b.push_str("EXCLUDED.");
                    b.build_column(column)
                })
            }
        }
    }

    /// Emit `col=?` for assignments and `col=<incoming(col)>` for bare columns.
    fn build_upsert_assigns(
        self,
        b: &mut SqlBuilder<'_>,
        upsert: &Upsert,
        incoming: impl Fn(&mut SqlBuilder<'_>, &str) -> OrmResult<()>,
    ) -> OrmResult<()> {
        for (i, assign) in upsert.assigns.iter().enumerate() {
            if i > 0 {
                b.push(',');
            }
            match assign {
                Assignable::Assignment(a) => {
                    b.build_column(&a.column)?;
                    b.push('=');
                    b.push_arg(a.value.clone());
                }
                Assignable::Column(c) => {
                    b.build_column(&c.name)?;
                    b.push('=');
                    incoming(b, &c.name)?;
                }
                Assignable::Raw(r) => {
                    return Err(OrmError::UnsupportedAssignable(format!(
                        "raw expression {:?} in {self:?} upsert",
                        r.text()
                    )));
                }
            }
        }
        Ok(())
    }
}
