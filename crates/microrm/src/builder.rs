//! Shared statement compiler used by every builder.

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::expr::{self, Expression, Predicate, RawExpr, Selectable};
use crate::model::Model;
use crate::query::Query;
use crate::value::Value;

/// Where an expression is being compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Clause {
    Projection,
    Where,
    Having,
}

/// Text buffer, argument list and resolution context for one statement.
pub(crate) struct SqlBuilder<'a> {
    sb: String,
    args: Vec<Value>,
    model: &'a Model,
    dialect: Dialect,
    quote: char,
}

impl<'a> SqlBuilder<'a> {
    pub(crate) fn new(model: &'a Model, dialect: Dialect) -> Self {
        Self {
            sb: String::with_capacity(128),
            args: Vec::new(),
            model,
            dialect,
            quote: dialect.quote_char(),
        }
    }

    pub(crate) fn push_str(&mut self, s: &str) {
        self.sb.push_str(s);
    }

    pub(crate) fn push(&mut self, ch: char) {
        self.sb.push(ch);
    }

    pub(crate) fn quote(&mut self, name: &str) {
        self.sb.push(self.quote);
        self.sb.push_str(name);
        self.sb.push(self.quote);
    }

    /// Resolve an entity field name and emit its quoted column.
    pub(crate) fn build_column(&mut self, name: &str) -> OrmResult<()> {
        let model = self.model;
        let field = model
            .field(name)
            .ok_or_else(|| OrmError::unknown_field(name))?;
        self.quote(&field.column_name);
        Ok(())
    }

    /// Emit the model's quoted table name, or `table` verbatim when given.
    pub(crate) fn build_table(&mut self, table: Option<&str>) {
        match table {
            Some(table) => self.sb.push_str(table),
            None => {
                let model = self.model;
                self.quote(model.table_name());
            }
        }
    }

    /// Emit one placeholder and bind `value` to it.
    pub(crate) fn push_arg(&mut self, value: Value) {
        self.args.push(value);
        let placeholder = self.dialect.placeholder(self.args.len());
        self.sb.push_str(&placeholder);
    }

    /// Emit a raw fragment and append its arguments.
    ///
    /// With numbered placeholders every `?` outside a string literal is renumbered.
    pub(crate) fn push_raw(&mut self, raw: &RawExpr) {
        match self.dialect {
            Dialect::MySql | Dialect::Sqlite => self.sb.push_str(&raw.text),
            Dialect::Postgres => {
                let mut index = self.args.len();
                // `'...'` literals, `''` escapes included, are copied as is
                let mut in_literal = false;
                for ch in raw.text.chars() {
                    if ch == '\'' {
                        in_literal = !in_literal;
                    }
                    if ch == '?' && !in_literal {
                        index += 1;
                        let placeholder = self.dialect.placeholder(index);
                        self.sb.push_str(&placeholder);
                    } else {
                        self.sb.push(ch);
                    }
                }
            }
        }
        self.args.extend(raw.args.iter().cloned());
    }

    fn build_alias(&mut self, alias: Option<&str>) {
        if let Some(alias) = alias {
            self.sb.push_str(" AS ");
            self.quote(alias);
        }
    }

    pub(crate) fn build_expression(&mut self, expr: &Expression, clause: Clause) -> OrmResult<()> {
        match expr {
            Expression::Predicate(p) => self.build_predicate(p, clause),
            // aliases only exist in projections
            Expression::Column(c) => self.build_column(&c.name),
            Expression::Value(v) => {
                self.push_arg(v.clone());
                Ok(())
            }
            Expression::Raw(r) => {
                self.push_raw(r);
                Ok(())
            }
            Expression::Aggregate(a) => {
                if clause != Clause::Having && clause != Clause::Projection {
                    return Err(OrmError::UnsupportedExpression(format!(
                        "aggregate {}({}) in {clause:?}",
                        a.func, a.column
                    )));
                }
                // alias is added by the projection only
                self.sb.push_str(a.func);
                self.sb.push('(');
                self.build_column(&a.column)?;
                self.sb.push(')');
                Ok(())
            }
        }
    }

    fn build_predicate(&mut self, p: &Predicate, clause: Clause) -> OrmResult<()> {
        if let Some(left) = &p.left {
            self.build_operand(left, clause)?;
        }
        if let Some(op) = p.op {
            self.sb.push(' ');
            self.sb.push_str(op.as_str());
            self.sb.push(' ');
        }
        if let Some(right) = &p.right {
            self.build_operand(right, clause)?;
        }
        Ok(())
    }

    /// Nested predicates, and only those, are parenthesized.
    fn build_operand(&mut self, expr: &Expression, clause: Clause) -> OrmResult<()> {
        let nested = expr.is_predicate();
        if nested {
            self.sb.push('(');
        }
        self.build_expression(expr, clause)?;
        if nested {
            self.sb.push(')');
        }
        Ok(())
    }

    /// Emit ` KEYWORD p1 AND p2 AND ...` when `predicates` is non-empty.
    pub(crate) fn build_predicates(
        &mut self,
        keyword: &str,
        predicates: &[Predicate],
        clause: Clause,
    ) -> OrmResult<()> {
        let Some(p) = expr::and_all(predicates) else {
            return Ok(());
        };
        self.sb.push(' ');
        self.sb.push_str(keyword);
        self.sb.push(' ');
        self.build_predicate(&p, clause)
    }

    /// Emit the projection list, `*` when empty.
    pub(crate) fn build_selectables(&mut self, columns: &[Selectable]) -> OrmResult<()> {
        if columns.is_empty() {
            self.sb.push('*');
            return Ok(());
        }
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                self.sb.push(',');
            }
            match column {
                Selectable::Column(c) => {
                    self.build_column(&c.name)?;
                    self.build_alias(c.alias.as_deref());
                }
                Selectable::Aggregate(a) => {
                    self.build_expression(&Expression::Aggregate(a.clone()), Clause::Projection)?;
                    self.build_alias(a.alias.as_deref());
                }
                Selectable::Raw(r) => self.push_raw(r),
            }
        }
        Ok(())
    }

    /// Terminate the statement with `;`.
    pub(crate) fn finish(mut self) -> Query {
        self.sb.push(';');
        Query {
            sql: self.sb,
            args: self.args,
        }
    }
}
