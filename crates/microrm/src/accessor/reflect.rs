use super::{ValueAccessor, scan_row};
use crate::error::{OrmError, OrmResult};
use crate::model::{Entity, Model};
use crate::row::Row;
use crate::value::Value;

/// Accessor backed by the entity's `Reflect` implementation.
#[derive(Debug, Clone, Copy)]
pub struct ReflectAccessor<'m> {
    model: &'m Model,
}

impl<'m> ReflectAccessor<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self { model }
    }
}

impl ValueAccessor for ReflectAccessor<'_> {
    fn field<E: Entity>(&self, entity: &E, name: &str) -> OrmResult<Value> {
        let field = self
            .model
            .field(name)
            .ok_or_else(|| OrmError::unknown_field(name))?;
        entity
            .get_field(field.field_name)
            .ok_or_else(|| OrmError::unknown_field(name))
    }

    fn set_columns<E: Entity>(&self, entity: &mut E, row: &Row) -> OrmResult<()> {
        for (field, value) in scan_row(self.model, row)? {
            entity.set_field(field.field_name, value)?;
        }
        Ok(())
    }
}
