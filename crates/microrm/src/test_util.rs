//! Fixtures shared by unit tests.

use crate::Entity;
use crate::dialect::Dialect;
use crate::mock::MockDriver;
use crate::row::Row;
use crate::session::{Db, DbOptions};
use crate::value::Value;
use chrono::NaiveDateTime;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Entity, Debug, Default, Clone, PartialEq)]
pub(crate) struct TestModel {
    pub id: i64,
    pub first_name: String,
    pub age: i8,
    pub last_name: Option<String>,
}

#[derive(Entity, Debug, Default, Clone, PartialEq)]
pub(crate) struct AllTypes {
    pub flag: bool,
    pub tiny: i8,
    pub small: i16,
    pub int: i32,
    pub big: i64,
    pub utiny: u8,
    pub usmall: u16,
    pub uint: u32,
    pub ubig: u64,
    pub float: f32,
    pub double: f64,
    pub text: String,
    pub bytes: Vec<u8>,
    pub uuid: Uuid,
    pub created_at: NaiveDateTime,
    pub maybe_int: Option<i32>,
    pub maybe_text: Option<String>,
}

pub(crate) fn row(columns: &[&str], values: Vec<Value>) -> Row {
    let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
    Row::new(columns, values).unwrap()
}

/// A `Db` over a fresh `MockDriver`, plus a handle to script it.
pub(crate) fn mock_db(dialect: Dialect) -> (MockDriver, Db) {
    let mock = MockDriver::new();
    let db = Db::with_options(mock.clone(), DbOptions::new().with_dialect(dialect));
    (mock, db)
}

pub(crate) const TEST_MODEL_COLUMNS: [&str; 4] = ["id", "first_name", "age", "last_name"];

pub(crate) fn tom() -> TestModel {
    TestModel {
        id: 1,
        first_name: "Tom".to_string(),
        age: 18,
        last_name: Some("Jerry".to_string()),
    }
}
