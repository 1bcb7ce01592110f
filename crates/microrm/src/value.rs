//! Dynamically typed SQL values and the Rust types that map onto them.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single SQL value, as bound to a placeholder or read from a result row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    UTinyInt(u8),
    USmallInt(u16),
    UInt(u32),
    UBigInt(u64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    DateTime(NaiveDateTime),
}

/// Scalar kind of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Bytes,
    Uuid,
    DateTime,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Bool => "bool",
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::U8 => "u8",
            ScalarKind::U16 => "u16",
            ScalarKind::U32 => "u32",
            ScalarKind::U64 => "u64",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::String => "String",
            ScalarKind::Bytes => "Vec<u8>",
            ScalarKind::Uuid => "Uuid",
            ScalarKind::DateTime => "NaiveDateTime",
        };
        f.write_str(name)
    }
}

/// Type descriptor of an entity field: its scalar kind and whether it is an `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueType {
    pub kind: ScalarKind,
    pub nullable: bool,
}

impl ValueType {
    pub const fn new(kind: ScalarKind) -> Self {
        Self {
            kind,
            nullable: false,
        }
    }

    pub const fn nullable(self) -> Self {
        Self {
            kind: self.kind,
            nullable: true,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "Option<{}>", self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn to_i128(&self) -> Result<i128, String> {
        match self {
            Value::Bool(b) => Ok(i128::from(*b)),
            Value::TinyInt(v) => Ok(i128::from(*v)),
            Value::SmallInt(v) => Ok(i128::from(*v)),
            Value::Int(v) => Ok(i128::from(*v)),
            Value::BigInt(v) => Ok(i128::from(*v)),
            Value::UTinyInt(v) => Ok(i128::from(*v)),
            Value::USmallInt(v) => Ok(i128::from(*v)),
            Value::UInt(v) => Ok(i128::from(*v)),
            Value::UBigInt(v) => Ok(i128::from(*v)),
            Value::Text(s) => s
                .trim()
                .parse::<i128>()
                .map_err(|e| format!("cannot parse {s:?} as integer: {e}")),
            Value::Bytes(b) => std::str::from_utf8(b)
                .ok()
                .and_then(|s| s.trim().parse::<i128>().ok())
                .ok_or_else(|| "cannot parse bytes as integer".to_string()),
            other => Err(format!("cannot convert {other:?} to integer")),
        }
    }

    fn to_int<T: TryFrom<i128>>(&self, kind: ScalarKind) -> Result<T, String> {
        let wide = self.to_i128()?;
        T::try_from(wide).map_err(|_| format!("{wide} is out of range for {kind}"))
    }

    fn to_f64(&self) -> Result<f64, String> {
        match self {
            Value::Float(v) => Ok(f64::from(*v)),
            Value::Double(v) => Ok(*v),
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("cannot parse {s:?} as float: {e}")),
            other => other.to_i128().map(|v| v as f64),
        }
    }

    fn to_bool(&self) -> Result<bool, String> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Text(s) => match s.trim() {
                "true" | "t" | "TRUE" | "1" => Ok(true),
                "false" | "f" | "FALSE" | "0" => Ok(false),
                other => Err(format!("cannot parse {other:?} as bool")),
            },
            other => other.to_i128().map(|v| v != 0),
        }
    }

    fn into_text(self) -> Result<String, String> {
        match self {
            Value::Text(s) => Ok(s),
            Value::Bytes(b) => String::from_utf8(b).map_err(|e| e.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Float(v) => Ok(v.to_string()),
            Value::Double(v) => Ok(v.to_string()),
            Value::Uuid(u) => Ok(u.to_string()),
            Value::DateTime(dt) => Ok(dt.to_string()),
            Value::Null => Err("cannot convert NULL to text".to_string()),
            other => other.to_i128().map(|v| v.to_string()),
        }
    }

    fn into_bytes(self) -> Result<Vec<u8>, String> {
        match self {
            Value::Bytes(b) => Ok(b),
            Value::Text(s) => Ok(s.into_bytes()),
            Value::Uuid(u) => Ok(u.as_bytes().to_vec()),
            other => Err(format!("cannot convert {other:?} to bytes")),
        }
    }

    fn into_uuid(self) -> Result<Uuid, String> {
        match self {
            Value::Uuid(u) => Ok(u),
            Value::Text(s) => Uuid::parse_str(s.trim()).map_err(|e| e.to_string()),
            Value::Bytes(b) => Uuid::from_slice(&b).map_err(|e| e.to_string()),
            other => Err(format!("cannot convert {other:?} to uuid")),
        }
    }

    fn into_datetime(self) -> Result<NaiveDateTime, String> {
        match self {
            Value::DateTime(dt) => Ok(dt),
            Value::Text(s) => {
                let s = s.trim();
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                    .map_err(|e| format!("cannot parse {s:?} as datetime: {e}"))
            }
            other => Err(format!("cannot convert {other:?} to datetime")),
        }
    }

    /// Convert this value into the canonical variant for `ty`.
    ///
    /// Integers are range checked, text is parsed, and NULL is only accepted
    /// for nullable targets.
    pub fn coerce(self, ty: ValueType) -> Result<Value, String> {
        if self.is_null() {
            return if ty.nullable {
                Ok(Value::Null)
            } else {
                Err(format!("NULL cannot be stored in a {ty} field"))
            };
        }
        let kind = ty.kind;
        match kind {
            ScalarKind::Bool => self.to_bool().map(Value::Bool),
            ScalarKind::I8 => self.to_int(kind).map(Value::TinyInt),
            ScalarKind::I16 => self.to_int(kind).map(Value::SmallInt),
            ScalarKind::I32 => self.to_int(kind).map(Value::Int),
            ScalarKind::I64 => self.to_int(kind).map(Value::BigInt),
            ScalarKind::U8 => self.to_int(kind).map(Value::UTinyInt),
            ScalarKind::U16 => self.to_int(kind).map(Value::USmallInt),
            ScalarKind::U32 => self.to_int(kind).map(Value::UInt),
            ScalarKind::U64 => self.to_int(kind).map(Value::UBigInt),
            ScalarKind::F32 => self.to_f64().map(|v| Value::Float(v as f32)),
            ScalarKind::F64 => self.to_f64().map(Value::Double),
            ScalarKind::String => self.into_text().map(Value::Text),
            ScalarKind::Bytes => self.into_bytes().map(Value::Bytes),
            ScalarKind::Uuid => self.into_uuid().map(Value::Uuid),
            ScalarKind::DateTime => self.into_datetime().map(Value::DateTime),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Rust types that can be stored in an entity field.
///
/// Implemented for the supported scalars and for `Option` of any of them.
pub trait SqlType: sealed::Sealed + Default + Sized + 'static {
    const VALUE_TYPE: ValueType;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, String>;
}

/// Non-nullable scalar types. `Option<T>` is a `SqlType` for every `T: Scalar`.
pub trait Scalar: SqlType {}

macro_rules! impl_scalar {
    ($($ty:ty => $kind:ident, $variant:ident;)*) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Scalar for $ty {}

            impl SqlType for $ty {
                const VALUE_TYPE: ValueType = ValueType::new(ScalarKind::$kind);

                fn to_value(&self) -> Value {
                    Value::$variant(<$ty as Clone>::clone(self))
                }

                fn from_value(value: Value) -> Result<Self, String> {
                    match value.coerce(Self::VALUE_TYPE)? {
                        Value::$variant(v) => Ok(v),
                        other => Err(format!("unexpected value {other:?}")),
                    }
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_scalar! {
    bool => Bool, Bool;
    i8 => I8, TinyInt;
    i16 => I16, SmallInt;
    i32 => I32, Int;
    i64 => I64, BigInt;
    u8 => U8, UTinyInt;
    u16 => U16, USmallInt;
    u32 => U32, UInt;
    u64 => U64, UBigInt;
    f32 => F32, Float;
    f64 => F64, Double;
    String => String, Text;
    Vec<u8> => Bytes, Bytes;
    Uuid => Uuid, Uuid;
    NaiveDateTime => DateTime, DateTime;
}

impl<T: Scalar> sealed::Sealed for Option<T> {}

impl<T: Scalar> SqlType for Option<T> {
    const VALUE_TYPE: ValueType = T::VALUE_TYPE.nullable();

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, String> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
