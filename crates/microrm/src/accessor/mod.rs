//! Value accessors: read entity fields for INSERT, write result rows into entities.
//!
//! Two strategies share one contract:
//!
//! - [`ReflectAccessor`] goes through the entity's generated by-name getters
//!   and setters. Always correct; the default.
//! - [`UnsafeAccessor`] reads and writes at `base + offset` using the offsets
//!   recorded at registration. Opt-in via [`AccessorKind::Unsafe`].

mod reflect;
mod unsafe_accessor;

#[cfg(test)]
mod tests;

pub use reflect::ReflectAccessor;
pub use unsafe_accessor::UnsafeAccessor;

use crate::error::{OrmError, OrmResult};
use crate::model::{Entity, Field, Model};
use crate::row::Row;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Field access strategy bound to one model.
pub trait ValueAccessor {
    /// Current value of entity field `name`.
    fn field<E: Entity>(&self, entity: &E, name: &str) -> OrmResult<Value>;

    /// Write every column of `row` into the matching entity field.
    ///
    /// Columns absent from the row keep their current value. A column the
    /// model does not know fails with `UnknownColumn` and leaves the entity
    /// untouched.
    fn set_columns<E: Entity>(&self, entity: &mut E, row: &Row) -> OrmResult<()>;
}

/// Which accessor a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccessorKind {
    #[default]
    Reflect,
    Unsafe,
}

impl AccessorKind {
    pub fn accessor(self, model: &Model) -> Accessor<'_> {
        match self {
            AccessorKind::Reflect => Accessor::Reflect(ReflectAccessor::new(model)),
            AccessorKind::Unsafe => Accessor::Unsafe(UnsafeAccessor::new(model)),
        }
    }
}

/// An accessor of the kind chosen by the session.
#[derive(Debug, Clone, Copy)]
pub enum Accessor<'m> {
    Reflect(ReflectAccessor<'m>),
    Unsafe(UnsafeAccessor<'m>),
}

impl ValueAccessor for Accessor<'_> {
    fn field<E: Entity>(&self, entity: &E, name: &str) -> OrmResult<Value> {
        match self {
            Accessor::Reflect(a) => a.field(entity, name),
            Accessor::Unsafe(a) => a.field(entity, name),
        }
    }

    fn set_columns<E: Entity>(&self, entity: &mut E, row: &Row) -> OrmResult<()> {
        match self {
            Accessor::Reflect(a) => a.set_columns(entity, row),
            Accessor::Unsafe(a) => a.set_columns(entity, row),
        }
    }
}

/// Resolve every row column and convert every value to its field's type.
///
/// Nothing is written until the whole row has been converted.
pub(crate) fn scan_row<'m>(model: &'m Model, row: &Row) -> OrmResult<Vec<(&'m Field, Value)>> {
    let fields = row
        .columns()
        .iter()
        .map(|column| {
            model
                .column(column)
                .ok_or_else(|| OrmError::unknown_column(column.as_str()))
        })
        .collect::<OrmResult<Vec<_>>>()?;

    fields
        .into_iter()
        .zip(row.values())
        .map(|(field, value)| {
            value
                .clone()
                .coerce(field.value_type)
                .map(|value| (field, value))
                .map_err(|msg| OrmError::decode(field.column_name.as_str(), msg))
        })
        .collect()
}
