//! Hand-written SQL run through the same pipeline as the builders.

use crate::error::OrmResult;
use crate::model::Entity;
use crate::query::{Query, QueryBuilder, QueryType};
use crate::row::ExecResult;
use crate::session::{self, Session};
use crate::value::Value;
use std::marker::PhantomData;

/// Verbatim SQL plus arguments, decoded into `T` on read.
///
/// The SQL is sent as written: no `;` is appended and placeholders are not
/// rewritten for the dialect.
pub struct RawQuerier<'s, T> {
    session: &'s dyn Session,
    sql: String,
    args: Vec<Value>,
    _entity: PhantomData<fn() -> T>,
}

impl<'s, T: Entity> RawQuerier<'s, T> {
    pub fn new(session: &'s dyn Session, sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            session,
            sql: sql.into(),
            args,
            _entity: PhantomData,
        }
    }

    fn query_type(&self) -> QueryType {
        QueryType::from_sql(&self.sql)
    }

    /// First row. Fails with `OrmError::NoRows` when there is none.
    pub async fn get(&self) -> OrmResult<T> {
        session::get_one::<T>(self.session, self.query_type(), self).await
    }

    pub async fn get_multi(&self) -> OrmResult<Vec<T>> {
        session::get_all::<T>(self.session, self.query_type(), self).await
    }

    pub async fn exec(&self) -> OrmResult<ExecResult> {
        session::exec::<T>(self.session, self.query_type(), self).await
    }
}

impl<T: Entity> QueryBuilder for RawQuerier<'_, T> {
    fn build(&self) -> OrmResult<Query> {
        Ok(Query::new(self.sql.clone(), self.args.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::error::OrmError;
    use crate::test_util::{TEST_MODEL_COLUMNS, TestModel, mock_db, tom};

    #[tokio::test]
    async fn test_raw_get_sends_sql_verbatim() {
        let (mock, db) = mock_db(Dialect::MySql);
        mock.expect_rows(
            &TEST_MODEL_COLUMNS,
            vec![vec!["1".into(), "Tom".into(), "18".into(), "Jerry".into()]],
        );

        let got = RawQuerier::<TestModel>::new(
            &db,
            "SELECT * FROM `test_model` WHERE `id` = ?",
            vec![1.into()],
        )
        .get()
        .await
        .unwrap();
        assert_eq!(got, tom());

        let sent = &mock.statements()[0];
        assert_eq!(sent.sql, "SELECT * FROM `test_model` WHERE `id` = ?");
        assert_eq!(sent.args, vec![Value::Int(1)]);
    }

    #[tokio::test]
    async fn test_raw_get_multi() {
        let (mock, db) = mock_db(Dialect::MySql);
        mock.expect_rows(
            &["id", "first_name"],
            vec![
                vec![1i64.into(), "Tom".into()],
                vec![2i64.into(), "Ann".into()],
            ],
        );
        let got = RawQuerier::<TestModel>::new(&db, "SELECT `id`,`first_name` FROM `test_model`", vec![])
            .get_multi()
            .await
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].first_name, "Ann");
    }

    #[tokio::test]
    async fn test_raw_get_no_rows() {
        let (mock, db) = mock_db(Dialect::MySql);
        mock.expect_rows(&TEST_MODEL_COLUMNS, vec![]);
        let err = RawQuerier::<TestModel>::new(&db, "SELECT * FROM `test_model`", vec![])
            .get()
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::NoRows));
    }

    #[tokio::test]
    async fn test_raw_exec() {
        let (mock, db) = mock_db(Dialect::MySql);
        mock.expect_exec(ExecResult::new(4));
        let res = RawQuerier::<TestModel>::new(&db, "DELETE FROM `test_model`", vec![])
            .exec()
            .await
            .unwrap();
        assert_eq!(res.rows_affected, 4);
    }

    #[test]
    fn test_raw_query_type() {
        let (_, db) = mock_db(Dialect::MySql);
        let q = RawQuerier::<TestModel>::new(&db, "update t set a = 1", vec![]);
        assert_eq!(q.query_type(), QueryType::Update);
        assert_eq!(q.build().unwrap().sql, "update t set a = 1");
    }
}
