//! `tokio-postgres` backed [`Driver`].
//!
//! Use with [`Dialect::Postgres`](crate::Dialect::Postgres) so statements carry
//! `$n` placeholders.
//!
//! ```ignore
//! let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
//! tokio::spawn(connection);
//! let db = Db::with_options(
//!     PgDriver::new(client),
//!     DbOptions::new().with_dialect(Dialect::Postgres),
//! );
//! ```

use crate::driver::{Driver, DriverTx, TransactionOptions};
use crate::error::{OrmError, OrmResult};
use crate::row::{ExecResult, Row};
use crate::value::{ScalarKind, Value, ValueType};
use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_postgres::Client;
use tokio_postgres::types::{IsNull, ToSql, Type};
use uuid::Uuid;

/// Scalar kind a parameter of type `ty` is converted to before encoding.
fn target_kind(ty: &Type) -> Option<ScalarKind> {
    let kind = match *ty {
        Type::BOOL => ScalarKind::Bool,
        Type::CHAR => ScalarKind::I8,
        Type::INT2 => ScalarKind::I16,
        Type::INT4 => ScalarKind::I32,
        Type::INT8 => ScalarKind::I64,
        Type::OID => ScalarKind::U32,
        Type::FLOAT4 => ScalarKind::F32,
        Type::FLOAT8 => ScalarKind::F64,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => ScalarKind::String,
        Type::BYTEA => ScalarKind::Bytes,
        Type::UUID => ScalarKind::Uuid,
        Type::TIMESTAMP => ScalarKind::DateTime,
        _ => return None,
    };
    Some(kind)
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        if self.is_null() {
            return Ok(IsNull::Yes);
        }
        let value = match target_kind(ty) {
            Some(kind) => self.clone().coerce(ValueType::new(kind))?,
            None => self.clone(),
        };
        match value {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::TinyInt(v) => v.to_sql(ty, out),
            Value::SmallInt(v) => v.to_sql(ty, out),
            Value::Int(v) => v.to_sql(ty, out),
            Value::BigInt(v) => v.to_sql(ty, out),
            Value::UTinyInt(v) => i16::from(v).to_sql(ty, out),
            Value::USmallInt(v) => i32::from(v).to_sql(ty, out),
            Value::UInt(v) if *ty == Type::OID => v.to_sql(ty, out),
            Value::UInt(v) => i64::from(v).to_sql(ty, out),
            Value::UBigInt(v) => i64::try_from(v)?.to_sql(ty, out),
            Value::Float(v) => v.to_sql(ty, out),
            Value::Double(v) => v.to_sql(ty, out),
            Value::Text(v) => v.to_sql(ty, out),
            Value::Bytes(v) => v.to_sql(ty, out),
            Value::Uuid(v) => v.to_sql(ty, out),
            Value::DateTime(v) if *ty == Type::TIMESTAMPTZ => v.and_utc().to_sql(ty, out),
            Value::DateTime(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

fn get<'r, T>(row: &'r tokio_postgres::Row, idx: usize) -> OrmResult<Option<T>>
where
    T: tokio_postgres::types::FromSql<'r>,
{
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| OrmError::decode(row.columns()[idx].name(), e.to_string()))
}

fn column_value(row: &tokio_postgres::Row, idx: usize) -> OrmResult<Value> {
    let ty = row.columns()[idx].type_();
    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx)?.map(Value::Bool),
        Type::CHAR => get::<i8>(row, idx)?.map(Value::TinyInt),
        Type::INT2 => get::<i16>(row, idx)?.map(Value::SmallInt),
        Type::INT4 => get::<i32>(row, idx)?.map(Value::Int),
        Type::INT8 => get::<i64>(row, idx)?.map(Value::BigInt),
        Type::OID => get::<u32>(row, idx)?.map(Value::UInt),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(Value::Float),
        Type::FLOAT8 => get::<f64>(row, idx)?.map(Value::Double),
        Type::BYTEA => get::<Vec<u8>>(row, idx)?.map(Value::Bytes),
        Type::UUID => get::<Uuid>(row, idx)?.map(Value::Uuid),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx)?.map(Value::DateTime),
        Type::TIMESTAMPTZ => {
            get::<DateTime<Utc>>(row, idx)?.map(|v| Value::DateTime(v.naive_utc()))
        }
        // text-like and anything that decodes as text
        _ => get::<String>(row, idx)?.map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}

fn convert_rows(rows: Vec<tokio_postgres::Row>) -> OrmResult<Vec<Row>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    rows.iter()
        .map(|row| {
            let values = (0..row.len())
                .map(|idx| column_value(row, idx))
                .collect::<OrmResult<Vec<_>>>()?;
            Row::new(Arc::clone(&columns), values)
        })
        .collect()
}

fn params(args: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

async fn run_query(client: &Client, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
    let rows = client.query(sql, &params(args)).await?;
    convert_rows(rows)
}

async fn run_execute(client: &Client, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
    let affected = client.execute(sql, &params(args)).await?;
    Ok(ExecResult::new(affected))
}

/// A single `tokio_postgres::Client`.
///
/// Statements are serialized on the client; an open transaction holds the
/// client until it is committed or rolled back.
#[derive(Clone)]
pub struct PgDriver {
    client: Arc<Mutex<Client>>,
}

impl PgDriver {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(Mutex::new(client)),
        }
    }
}

impl std::fmt::Debug for PgDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgDriver").finish_non_exhaustive()
    }
}

#[async_trait]
impl Driver for PgDriver {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        let client = self.client.lock().await;
        run_query(&client, sql, args).await
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
        let client = self.client.lock().await;
        run_execute(&client, sql, args).await
    }

    async fn begin(&self, options: &TransactionOptions) -> OrmResult<Box<dyn DriverTx>> {
        let client = Arc::clone(&self.client).lock_owned().await;
        client.batch_execute(&options.begin_sql()).await?;
        Ok(Box::new(PgTx { client }))
    }
}

struct PgTx {
    client: OwnedMutexGuard<Client>,
}

#[async_trait]
impl DriverTx for PgTx {
    async fn query(&mut self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        run_query(&self.client, sql, args).await
    }

    async fn execute(&mut self, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
        run_execute(&self.client, sql, args).await
    }

    async fn commit(self: Box<Self>) -> OrmResult<()> {
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> OrmResult<()> {
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }

    /// The client stays locked until `ROLLBACK` has completed, so no other
    /// statement can run inside the abandoned transaction.
    fn rollback_on_drop(self: Box<Self>) {
        let PgTx { client } = *self;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = client.batch_execute("ROLLBACK").await {
                        tracing::warn!(target: "microrm", error = %err, "rollback of dropped transaction failed");
                    }
                });
            }
            // without a runtime the connection task is gone as well
            Err(_) => {
                tracing::warn!(target: "microrm", "transaction dropped outside a tokio runtime; not rolled back");
            }
        }
    }
}
