use super::{ReflectAccessor, ValueAccessor, scan_row};
use crate::error::{OrmError, OrmResult};
use crate::model::{Entity, Model};
use crate::row::Row;
use crate::value::{ScalarKind, SqlType, Value};

/// Run `$body` with `$T` bound to the Rust type described by a `ValueType`.
macro_rules! with_field_type {
    ($vt:expr, |$T:ident| $body:expr) => {
        with_field_type!(@arms $vt, $T, $body;
            Bool => bool,
            I8 => i8,
            I16 => i16,
            I32 => i32,
            I64 => i64,
            U8 => u8,
            U16 => u16,
            U32 => u32,
            U64 => u64,
            F32 => f32,
            F64 => f64,
            String => String,
            Bytes => Vec<u8>,
            Uuid => uuid::Uuid,
            DateTime => chrono::NaiveDateTime
        )
    };
    (@arms $vt:expr, $T:ident, $body:expr; $($kind:ident => $ty:ty),*) => {
        match ($vt.kind, $vt.nullable) {
            $(
                (ScalarKind::$kind, false) => {
                    type $T = $ty;
                    $body
                }
                (ScalarKind::$kind, true) => {
                    type $T = Option<$ty>;
                    $body
                }
            )*
        }
    };
}

/// # Safety
///
/// `base + offset` must point to an initialized `T` inside a live entity.
unsafe fn read<T: SqlType>(base: *const u8, offset: usize) -> Value {
    // SAFETY: upheld by the caller.
    unsafe { (*base.add(offset).cast::<T>()).to_value() }
}

/// # Safety
///
/// `base + offset` must point to an initialized `T` inside a live, uniquely
/// borrowed entity.
unsafe fn write<T: SqlType>(base: *mut u8, offset: usize, value: Value) -> Result<(), String> {
    let value = T::from_value(value)?;
    // SAFETY: upheld by the caller; the old value is dropped in place.
    unsafe { *base.add(offset).cast::<T>() = value };
    Ok(())
}

/// Accessor that reads and writes fields through their byte offsets.
///
/// Only valid for instances of the exact type the model was registered for.
/// Every call checks the model's type, and the first call per model compares
/// its reads against [`ReflectAccessor`] on a default instance.
#[derive(Debug, Clone, Copy)]
pub struct UnsafeAccessor<'m> {
    model: &'m Model,
}

impl<'m> UnsafeAccessor<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self { model }
    }

    fn check<E: Entity>(&self) -> OrmResult<()> {
        if !self.model.is_model_of::<E>() {
            return Err(OrmError::ModelMismatch {
                model: self.model.type_name().to_string(),
                entity: std::any::type_name::<E>().to_string(),
            });
        }
        self.model
            .layout_check
            .get_or_init(|| layout_self_check::<E>(self.model))
            .clone()
            .map_err(OrmError::Other)
    }
}

/// Compare offset reads with by-name reads on `E::default()`.
fn layout_self_check<E: Entity>(model: &Model) -> Result<(), String> {
    let probe = E::default();
    let reflect = ReflectAccessor::new(model);
    let base = (&probe as *const E).cast::<u8>();
    for field in model.fields() {
        // SAFETY: the model was registered for `E` (checked by the caller).
        let by_offset =
            with_field_type!(field.value_type, |T| unsafe { read::<T>(base, field.offset) });
        let by_name = reflect
            .field(&probe, field.field_name)
            .map_err(|e| e.to_string())?;
        if by_offset != by_name {
            tracing::warn!(
                target: "microrm",
                entity = model.type_name(),
                field = field.field_name,
                "raw-memory accessor disagrees with reflective accessor"
            );
            return Err(format!(
                "layout self-check failed for {}.{}: offset read {:?}, reflective read {:?}",
                model.type_name(),
                field.field_name,
                by_offset,
                by_name
            ));
        }
    }
    Ok(())
}

impl ValueAccessor for UnsafeAccessor<'_> {
    fn field<E: Entity>(&self, entity: &E, name: &str) -> OrmResult<Value> {
        self.check::<E>()?;
        let field = self
            .model
            .field(name)
            .ok_or_else(|| OrmError::unknown_field(name))?;
        let base = (entity as *const E).cast::<u8>();
        // SAFETY: the model belongs to `E`, and `Entity` guarantees that
        // `offset` addresses a field of exactly `value_type`.
        let value =
            with_field_type!(field.value_type, |T| unsafe { read::<T>(base, field.offset) });
        Ok(value)
    }

    fn set_columns<E: Entity>(&self, entity: &mut E, row: &Row) -> OrmResult<()> {
        self.check::<E>()?;
        let values = scan_row(self.model, row)?;
        let base = (entity as *mut E).cast::<u8>();
        for (field, value) in values {
            // SAFETY: as in `field`; `entity` is uniquely borrowed.
            let written = with_field_type!(field.value_type, |T| unsafe {
                write::<T>(base, field.offset, value)
            });
            written.map_err(|msg| OrmError::decode(field.column_name.as_str(), msg))?;
        }
        Ok(())
    }
}
