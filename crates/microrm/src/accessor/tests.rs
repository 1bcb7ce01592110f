use super::*;
use crate::model::{Reflect, Registry};
use crate::test_util::{AllTypes, TestModel, row};
use chrono::NaiveDateTime;
use uuid::Uuid;

const KINDS: [AccessorKind; 2] = [AccessorKind::Reflect, AccessorKind::Unsafe];

fn sample() -> AllTypes {
    AllTypes {
        flag: true,
        tiny: -8,
        small: -16,
        int: -32,
        big: -64,
        utiny: 8,
        usmall: 16,
        uint: 32,
        ubig: 64,
        float: 1.5,
        double: 2.25,
        text: "hello".to_string(),
        bytes: vec![1, 2, 3],
        uuid: Uuid::from_u128(0x1234),
        created_at: NaiveDateTime::parse_from_str("2024-05-06 07:08:09", "%Y-%m-%d %H:%M:%S")
            .unwrap(),
        maybe_int: Some(7),
        maybe_text: None,
    }
}

#[test]
fn test_field_all_types_agree() {
    let registry = Registry::new();
    let model = registry.get::<AllTypes>().unwrap();
    let entity = sample();

    for field in model.fields() {
        let by_reflect = AccessorKind::Reflect
            .accessor(&model)
            .field(&entity, field.field_name)
            .unwrap();
        let by_offset = AccessorKind::Unsafe
            .accessor(&model)
            .field(&entity, field.field_name)
            .unwrap();
        assert_eq!(by_reflect, by_offset, "field {}", field.field_name);
    }

    let accessor = AccessorKind::Unsafe.accessor(&model);
    assert_eq!(accessor.field(&entity, "text").unwrap(), Value::Text("hello".into()));
    assert_eq!(accessor.field(&entity, "maybe_int").unwrap(), Value::Int(7));
    assert_eq!(accessor.field(&entity, "maybe_text").unwrap(), Value::Null);
}

#[test]
fn test_set_columns_all_types_agree() {
    let registry = Registry::new();
    let model = registry.get::<AllTypes>().unwrap();
    let expected = sample();

    let columns: Vec<&str> = model.fields().iter().map(|f| f.column_name.as_str()).collect();
    let values: Vec<Value> = model
        .fields()
        .iter()
        .map(|f| expected.get_field(f.field_name).unwrap())
        .collect();
    let r = row(&columns, values);

    for kind in KINDS {
        let mut entity = AllTypes::default();
        kind.accessor(&model).set_columns(&mut entity, &r).unwrap();
        assert_eq!(entity, expected, "{kind:?}");
    }
}

#[test]
fn test_set_columns_partial_projection() {
    let registry = Registry::new();
    let model = registry.get::<TestModel>().unwrap();
    let r = row(&["id", "first_name"], vec![Value::BigInt(1), Value::Text("Tom".into())]);

    for kind in KINDS {
        let mut entity = TestModel::default();
        kind.accessor(&model).set_columns(&mut entity, &r).unwrap();
        assert_eq!(
            entity,
            TestModel {
                id: 1,
                first_name: "Tom".to_string(),
                ..Default::default()
            }
        );
    }
}

#[test]
fn test_set_columns_coerces_driver_values() {
    let registry = Registry::new();
    let model = registry.get::<TestModel>().unwrap();
    // drivers commonly report narrow ints as wider types and text as bytes
    let r = row(
        &["id", "first_name", "age", "last_name"],
        vec![
            Value::Int(1),
            Value::Bytes(b"Tom".to_vec()),
            Value::BigInt(18),
            Value::Text("Jerry".into()),
        ],
    );

    for kind in KINDS {
        let mut entity = TestModel::default();
        kind.accessor(&model).set_columns(&mut entity, &r).unwrap();
        assert_eq!(
            entity,
            TestModel {
                id: 1,
                first_name: "Tom".to_string(),
                age: 18,
                last_name: Some("Jerry".to_string()),
            }
        );
    }
}

#[test]
fn test_set_columns_unknown_column() {
    let registry = Registry::new();
    let model = registry.get::<TestModel>().unwrap();
    let r = row(
        &["id", "gender"],
        vec![Value::BigInt(1), Value::Text("male".into())],
    );

    for kind in KINDS {
        let mut entity = TestModel::default();
        let err = kind.accessor(&model).set_columns(&mut entity, &r).unwrap_err();
        assert!(matches!(err, OrmError::UnknownColumn(ref c) if c == "gender"));
        // nothing is written when any column fails to resolve
        assert_eq!(entity, TestModel::default());
    }
}

#[test]
fn test_set_columns_null_into_non_nullable() {
    let registry = Registry::new();
    let model = registry.get::<TestModel>().unwrap();
    let r = row(&["id", "first_name"], vec![Value::BigInt(3), Value::Null]);

    for kind in KINDS {
        let mut entity = TestModel::default();
        let err = kind.accessor(&model).set_columns(&mut entity, &r).unwrap_err();
        assert!(matches!(err, OrmError::Decode { ref column, .. } if column == "first_name"));
        assert_eq!(entity.id, 0);
    }
}

#[test]
fn test_field_unknown_field() {
    let registry = Registry::new();
    let model = registry.get::<TestModel>().unwrap();
    let entity = TestModel::default();

    for kind in KINDS {
        let err = kind.accessor(&model).field(&entity, "gender").unwrap_err();
        assert!(matches!(err, OrmError::UnknownField(ref f) if f == "gender"));
    }
}

#[test]
fn test_unsafe_accessor_rejects_other_type() {
    let registry = Registry::new();
    let model = registry.get::<TestModel>().unwrap();
    let mut other = AllTypes::default();

    let accessor = UnsafeAccessor::new(&model);
    let err = accessor.field(&other, "id").unwrap_err();
    assert!(matches!(err, OrmError::ModelMismatch { .. }));

    let r = row(&["id"], vec![Value::BigInt(1)]);
    let err = accessor.set_columns(&mut other, &r).unwrap_err();
    assert!(matches!(err, OrmError::ModelMismatch { .. }));
}

#[test]
fn test_unsafe_accessor_layout_check_runs_once() {
    let registry = Registry::new();
    let model = registry.get::<TestModel>().unwrap();
    assert!(model.layout_check.get().is_none());

    let accessor = UnsafeAccessor::new(&model);
    accessor.field(&TestModel::default(), "age").unwrap();
    assert_eq!(model.layout_check.get(), Some(&Ok(())));
}
