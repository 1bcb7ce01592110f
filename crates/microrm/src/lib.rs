//! # microrm
//!
//! A typed query builder and micro-ORM.
//!
//! ## Features
//!
//! - **Typed builders**: `Selector`, `Inserter`, `Updater`, `Deleter` and `RawQuerier`
//!   compile to SQL text plus positional arguments
//! - **Entity registry**: struct fields map to columns through `#[derive(Entity)]`,
//!   `#[orm(...)]` tags and registration options
//! - **Dialects**: MySQL, SQLite and Postgres quoting, placeholders and upserts
//! - **Two accessors**: a reflective one (default) and an opt-in raw-memory one
//! - **Middleware**: wrap every statement with logging or custom policy
//! - **Transactions**: `do_tx` commits or rolls back for you, `do_tx_ambient`
//!   joins the transaction already running in the current task
//!
//! ```ignore
//! use microrm::{col, Db, Entity, Inserter, Selector};
//!
//! #[derive(Entity, Debug, Default)]
//! struct User {
//!     id: i64,
//!     first_name: String,
//!     age: i8,
//! }
//!
//! let db = Db::new(driver);
//!
//! Inserter::<User>::new(&db)
//!     .values([User { id: 1, first_name: "Tom".into(), age: 18 }])
//!     .exec()
//!     .await?;
//!
//! let tom = Selector::<User>::new(&db)
//!     .where_(col("first_name").eq("Tom"))
//!     .get()
//!     .await?;
//! ```

extern crate self as microrm;

pub mod accessor;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod expr;
pub mod middleware;
pub mod mock;
pub mod model;
pub mod query;
pub mod row;
pub mod session;
pub mod transaction;
pub mod value;

mod builder;
mod delete;
mod insert;
mod raw;
mod select;
mod update;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(test)]
mod test_util;

pub use accessor::{AccessorKind, ValueAccessor};
pub use delete::Deleter;
pub use dialect::Dialect;
pub use driver::{Driver, DriverTx, TransactionIsolation, TransactionOptions};
pub use error::{OrmError, OrmResult};
pub use expr::{
    Assignable, Column, OrderBy, Predicate, Selectable, asc, assign, avg, col, count, desc, max,
    min, not, raw, sum,
};
pub use insert::{Inserter, UpsertBuilder};
pub use middleware::{Middleware, Next, QueryContext, QueryLog, QueryResult};
pub use mock::MockDriver;
pub use model::{Entity, Model, ModelOption, Registry};
pub use query::{Query, QueryBuilder, QueryType};
pub use raw::RawQuerier;
pub use row::{ExecResult, Row};
pub use select::Selector;
pub use session::{Core, Db, DbOptions, Session};
pub use transaction::{Tx, current_tx};
pub use update::Updater;
pub use value::{SqlType, Value};

#[cfg(feature = "postgres")]
pub use postgres::PgDriver;

#[cfg(feature = "derive")]
pub use microrm_derive::Entity;
