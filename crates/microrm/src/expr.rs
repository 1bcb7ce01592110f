//! Expression AST: columns, literal values, raw SQL fragments, aggregates and predicates.
//!
//! ```ignore
//! use microrm::expr::{col, not};
//!
//! let p = col("first_name").eq("Tom").and(col("id").eq(123));
//! let n = not(col("age").lt(18));
//! ```

use crate::value::Value;
use std::fmt;

/// Comparison / logical operator of a [`Predicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Not,
    And,
    Or,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Not => "NOT",
            Op::And => "AND",
            Op::Or => "OR",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of the expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Column(Column),
    Value(Value),
    Raw(RawExpr),
    Aggregate(Aggregate),
    Predicate(Box<Predicate>),
}

impl Expression {
    pub fn is_predicate(&self) -> bool {
        matches!(self, Expression::Predicate(_))
    }
}

/// Conversion into an expression operand.
///
/// Anything convertible into a [`Value`] becomes a bound literal; columns,
/// raw fragments and aggregates are used as-is.
pub trait IntoExpression {
    fn into_expression(self) -> Expression;
}

impl<T: Into<Value>> IntoExpression for T {
    fn into_expression(self) -> Expression {
        Expression::Value(self.into())
    }
}

impl IntoExpression for Expression {
    fn into_expression(self) -> Expression {
        self
    }
}

impl IntoExpression for Column {
    fn into_expression(self) -> Expression {
        Expression::Column(self)
    }
}

impl IntoExpression for RawExpr {
    fn into_expression(self) -> Expression {
        Expression::Raw(self)
    }
}

impl IntoExpression for Aggregate {
    fn into_expression(self) -> Expression {
        Expression::Aggregate(self)
    }
}

impl IntoExpression for Predicate {
    fn into_expression(self) -> Expression {
        Expression::Predicate(Box::new(self))
    }
}

/// `left op right`. Either side may be absent: `NOT` has no left operand and a
/// raw predicate has no operator.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub(crate) left: Option<Expression>,
    pub(crate) op: Option<Op>,
    pub(crate) right: Option<Expression>,
}

impl Predicate {
    fn binary(left: Expression, op: Op, right: Expression) -> Self {
        Self {
            left: Some(left),
            op: Some(op),
            right: Some(right),
        }
    }

    pub fn and(self, right: Predicate) -> Predicate {
        Self::binary(self.into_expression(), Op::And, right.into_expression())
    }

    pub fn or(self, right: Predicate) -> Predicate {
        Self::binary(self.into_expression(), Op::Or, right.into_expression())
    }

    pub fn left(&self) -> Option<&Expression> {
        self.left.as_ref()
    }

    pub fn op(&self) -> Option<Op> {
        self.op
    }

    pub fn right(&self) -> Option<&Expression> {
        self.right.as_ref()
    }
}

/// `NOT (p)`
pub fn not(p: Predicate) -> Predicate {
    Predicate {
        left: None,
        op: Some(Op::Not),
        right: Some(p.into_expression()),
    }
}

/// Reduce a list of predicates with left-associative `AND`.
pub(crate) fn and_all(predicates: &[Predicate]) -> Option<Predicate> {
    let mut iter = predicates.iter().cloned();
    let first = iter.next()?;
    Some(iter.fold(first, Predicate::and))
}

macro_rules! comparison_methods {
    ($ty:ty) => {
        impl $ty {
            pub fn eq(self, arg: impl IntoExpression) -> Predicate {
                Predicate::binary(self.into_expression(), Op::Eq, arg.into_expression())
            }

            pub fn ne(self, arg: impl IntoExpression) -> Predicate {
                Predicate::binary(self.into_expression(), Op::Ne, arg.into_expression())
            }

            pub fn lt(self, arg: impl IntoExpression) -> Predicate {
                Predicate::binary(self.into_expression(), Op::Lt, arg.into_expression())
            }

            pub fn le(self, arg: impl IntoExpression) -> Predicate {
                Predicate::binary(self.into_expression(), Op::Le, arg.into_expression())
            }

            pub fn gt(self, arg: impl IntoExpression) -> Predicate {
                Predicate::binary(self.into_expression(), Op::Gt, arg.into_expression())
            }

            pub fn ge(self, arg: impl IntoExpression) -> Predicate {
                Predicate::binary(self.into_expression(), Op::Ge, arg.into_expression())
            }
        }
    };
}

/// A column referenced by entity field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub(crate) name: String,
    pub(crate) alias: Option<String>,
}

/// Reference a column by its entity field name.
pub fn col(name: impl Into<String>) -> Column {
    Column {
        name: name.into(),
        alias: None,
    }
}

impl Column {
    /// `AS alias` in a projection. Ignored inside WHERE and HAVING.
    pub fn alias(self, alias: impl Into<String>) -> Column {
        Column {
            name: self.name,
            alias: Some(alias.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

comparison_methods!(Column);

/// A SQL fragment emitted verbatim, with its own arguments.
///
/// Placeholders inside the text are written as `?`; the caller keeps their
/// count equal to `args.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawExpr {
    pub(crate) text: String,
    pub(crate) args: Vec<Value>,
}

/// Build a raw SQL fragment.
pub fn raw(text: impl Into<String>, args: Vec<Value>) -> RawExpr {
    RawExpr {
        text: text.into(),
        args,
    }
}

impl RawExpr {
    /// Use the fragment as a whole predicate, e.g. in `where_`.
    pub fn as_predicate(self) -> Predicate {
        Predicate {
            left: Some(Expression::Raw(self)),
            op: None,
            right: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

comparison_methods!(RawExpr);

/// Aggregate function applied to one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub(crate) func: &'static str,
    pub(crate) column: String,
    pub(crate) alias: Option<String>,
}

impl Aggregate {
    fn new(func: &'static str, column: impl Into<String>) -> Self {
        Self {
            func,
            column: column.into(),
            alias: None,
        }
    }

    pub fn alias(self, alias: impl Into<String>) -> Aggregate {
        Aggregate {
            alias: Some(alias.into()),
            ..self
        }
    }
}

comparison_methods!(Aggregate);

pub fn avg(column: impl Into<String>) -> Aggregate {
    Aggregate::new("AVG", column)
}

pub fn sum(column: impl Into<String>) -> Aggregate {
    Aggregate::new("SUM", column)
}

pub fn count(column: impl Into<String>) -> Aggregate {
    Aggregate::new("COUNT", column)
}

pub fn max(column: impl Into<String>) -> Aggregate {
    Aggregate::new("MAX", column)
}

pub fn min(column: impl Into<String>) -> Aggregate {
    Aggregate::new("MIN", column)
}

/// A projection target of `SELECT`.
#[derive(Debug, Clone, PartialEq)]
pub enum Selectable {
    Column(Column),
    Aggregate(Aggregate),
    Raw(RawExpr),
}

impl From<Column> for Selectable {
    fn from(c: Column) -> Self {
        Selectable::Column(c)
    }
}

impl From<Aggregate> for Selectable {
    fn from(a: Aggregate) -> Self {
        Selectable::Aggregate(a)
    }
}

impl From<RawExpr> for Selectable {
    fn from(r: RawExpr) -> Self {
        Selectable::Raw(r)
    }
}

/// `column = value`
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub(crate) column: String,
    pub(crate) value: Value,
}

/// Bind `value` to the column of entity field `column`.
pub fn assign(column: impl Into<String>, value: impl Into<Value>) -> Assignment {
    Assignment {
        column: column.into(),
        value: value.into(),
    }
}

/// Entry of an UPDATE SET list or an upsert update list.
///
/// A bare `Column` means "take the value of the row being inserted"; it is
/// only meaningful in an upsert.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignable {
    Assignment(Assignment),
    Column(Column),
    Raw(RawExpr),
}

impl From<Assignment> for Assignable {
    fn from(a: Assignment) -> Self {
        Assignable::Assignment(a)
    }
}

impl From<Column> for Assignable {
    fn from(c: Column) -> Self {
        Assignable::Column(c)
    }
}

impl From<RawExpr> for Assignable {
    fn from(r: RawExpr) -> Self {
        Assignable::Raw(r)
    }
}

/// `ORDER BY` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub(crate) column: String,
    pub(crate) desc: bool,
}

pub fn asc(column: impl Into<String>) -> OrderBy {
    OrderBy {
        column: column.into(),
        desc: false,
    }
}

pub fn desc(column: impl Into<String>) -> OrderBy {
    OrderBy {
        column: column.into(),
        desc: true,
    }
}
