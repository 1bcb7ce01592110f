//! Entity metadata: the `Entity` schema contract and the resolved `Model`.
//!
//! Entities normally derive their schema:
//!
//! ```ignore
//! #[derive(microrm::Entity, Default)]
//! struct TestModel {
//!     id: i64,
//!     #[orm("column:first_name_t")]
//!     first_name: String,
//!     age: i8,
//!     last_name: Option<String>,
//! }
//! ```

mod registry;


pub use registry::{ModelOption, Registry, underscore_name};

use crate::error::OrmResult;
use crate::value::{Value, ValueType};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Declared shape of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityShape {
    /// Struct with named fields (the only registrable shape).
    Struct,
    TupleStruct,
    Unit,
    Enum,
}

/// A field as declared by the entity, before tag parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    /// Raw tag string, e.g. `"column:first_name_t"`.
    pub tag: Option<&'static str>,
    pub value_type: ValueType,
    pub offset: usize,
}

/// Everything the registry needs to know about an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    pub type_name: &'static str,
    pub shape: EntityShape,
    pub fields: Vec<FieldDef>,
}

/// By-name field access, used by the reflective accessor.
pub trait Reflect {
    fn get_field(&self, name: &str) -> Option<Value>;

    fn set_field(&mut self, name: &str, value: Value) -> OrmResult<()>;
}

/// A type that can be mapped to a table.
///
/// # Safety
///
/// For every `FieldDef` returned by `schema()`, `offset` must be the byte
/// offset of a field of `Self` whose Rust type is exactly the type described
/// by `value_type` (`T` for a non-nullable kind, `Option<T>` for a nullable
/// one). The raw-memory accessor reads and writes through those offsets.
/// `#[derive(Entity)]` upholds this.
pub unsafe trait Entity: Reflect + Default + Send + Sync + 'static {
    fn schema() -> EntitySchema;

    /// Table name overriding the snake_case type name.
    /// `#[orm(table = "...")]` implements this.
    fn table_name() -> Option<&'static str> {
        None
    }
}

/// Resolved column metadata for one entity field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub column_name: String,
    pub field_name: &'static str,
    pub value_type: ValueType,
    /// Byte offset inside the entity; only valid for the model's own type.
    pub offset: usize,
}

/// Table and column metadata for one entity type.
#[derive(Debug)]
pub struct Model {
    type_id: TypeId,
    type_name: &'static str,
    table_name: String,
    fields: Vec<Field>,
    field_map: HashMap<&'static str, usize>,
    column_map: HashMap<String, usize>,
    pub(crate) layout_check: OnceLock<Result<(), String>>,
}

impl Model {
    fn new(
        type_id: TypeId,
        type_name: &'static str,
        table_name: String,
        fields: Vec<Field>,
    ) -> Self {
        let mut model = Self {
            type_id,
            type_name,
            table_name,
            fields,
            field_map: HashMap::new(),
            column_map: HashMap::new(),
            layout_check: OnceLock::new(),
        };
        model.rebuild_maps();
        model
    }

    /// Re-key both maps from `fields` so they always describe the same field set.
    fn rebuild_maps(&mut self) {
        self.field_map = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.field_name, i))
            .collect();
        self.column_map = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.column_name.clone(), i))
            .collect();
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by entity field name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.field_map.get(name).map(|&i| &self.fields[i])
    }

    /// Look up a field by column name.
    pub fn column(&self, name: &str) -> Option<&Field> {
        self.column_map.get(name).map(|&i| &self.fields[i])
    }

    /// Whether this model was registered for `E`.
    pub fn is_model_of<E: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<E>()
    }
}
