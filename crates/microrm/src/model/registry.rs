use super::{Entity, EntityShape, Field, Model};
use crate::error::{OrmError, OrmResult};
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

const TAG_KEY_COLUMN: &str = "column";

/// Registration-time override applied after tags are parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelOption {
    TableName(String),
    ColumnName { field: String, column: String },
}

impl ModelOption {
    pub fn table_name(name: impl Into<String>) -> Self {
        Self::TableName(name.into())
    }

    pub fn column_name(field: impl Into<String>, column: impl Into<String>) -> Self {
        Self::ColumnName {
            field: field.into(),
            column: column.into(),
        }
    }

    fn apply(self, model: &mut Model) -> OrmResult<()> {
        match self {
            ModelOption::TableName(name) => model.table_name = name,
            ModelOption::ColumnName { field, column } => {
                let target = model
                    .fields
                    .iter_mut()
                    .find(|f| f.field_name == field)
                    .ok_or(OrmError::UnknownField(field))?;
                target.column_name = column;
            }
        }
        Ok(())
    }
}

/// Per-type cache of `Model`s.
///
/// Shared between sessions through an `Arc`; lookups are read-mostly after
/// startup. Two tasks registering the same type concurrently both compute the
/// model and the last store wins.
#[derive(Debug, Default)]
pub struct Registry {
    models: RwLock<HashMap<TypeId, Arc<Model>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached model for `E`, registering it with no options on a miss.
    pub fn get<E: Entity>(&self) -> OrmResult<Arc<Model>> {
        let cached = self
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<E>())
            .cloned();
        match cached {
            Some(model) => Ok(model),
            None => self.register::<E>(Vec::new()),
        }
    }

    /// Build the model for `E`, apply `options` and cache the result.
    pub fn register<E: Entity>(
        &self,
        options: impl IntoIterator<Item = ModelOption>,
    ) -> OrmResult<Arc<Model>> {
        let schema = E::schema();
        if schema.shape != EntityShape::Struct {
            return Err(OrmError::InvalidEntityShape(format!(
                "{} ({:?})",
                schema.type_name, schema.shape
            )));
        }

        let mut fields = Vec::with_capacity(schema.fields.len());
        for def in &schema.fields {
            let tags = parse_tag(def.tag)?;
            let column_name = match tags.get(TAG_KEY_COLUMN) {
                Some(name) if !name.is_empty() => (*name).to_string(),
                _ => underscore_name(def.name),
            };
            fields.push(Field {
                column_name,
                field_name: def.name,
                value_type: def.value_type,
                offset: def.offset,
            });
        }

        let table_name = match E::table_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => underscore_name(schema.type_name),
        };

        let mut model = Model::new(TypeId::of::<E>(), schema.type_name, table_name, fields);
        for option in options {
            option.apply(&mut model)?;
        }
        check_unique_columns(&model)?;
        model.rebuild_maps();

        tracing::debug!(
            target: "microrm",
            entity = schema.type_name,
            table = model.table_name(),
            fields = model.fields().len(),
            "registered model"
        );

        let model = Arc::new(model);
        self.models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<E>(), Arc::clone(&model));
        Ok(model)
    }
}

fn check_unique_columns(model: &Model) -> OrmResult<()> {
    let mut seen = HashSet::with_capacity(model.fields().len());
    match model
        .fields()
        .iter()
        .find(|f| !seen.insert(f.column_name.as_str()))
    {
        Some(dup) => Err(OrmError::DuplicateColumn(format!(
            "{}.{} -> {}",
            model.type_name(),
            dup.field_name,
            dup.column_name
        ))),
        None => Ok(()),
    }
}

fn parse_tag(tag: Option<&'static str>) -> OrmResult<HashMap<&'static str, &'static str>> {
    let Some(tag) = tag else {
        return Ok(HashMap::new());
    };
    let mut pairs = HashMap::new();
    for pair in tag.split(',') {
        let segs: Vec<&str> = pair.split(':').collect();
        let [key, value] = segs.as_slice() else {
            return Err(OrmError::InvalidTagContent(pair.to_string()));
        };
        pairs.insert(*key, *value);
    }
    Ok(pairs)
}

/// `FirstName` -> `first_name`. An uppercase letter at index 0 gets no `_`.
pub fn underscore_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
