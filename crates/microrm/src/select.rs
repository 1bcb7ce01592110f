//! SELECT builder.

use crate::builder::{Clause, SqlBuilder};
use crate::error::OrmResult;
use crate::expr::{Column, OrderBy, Predicate, Selectable};
use crate::model::Entity;
use crate::query::{Query, QueryBuilder, QueryType};
use crate::session::{self, Session};
use std::marker::PhantomData;

/// `SELECT ... FROM ...` for entity `T`.
///
/// ```ignore
/// let users: Vec<User> = Selector::<User>::new(&db)
///     .where_(col("age").gt(18))
///     .order_by([desc("age")])
///     .limit(10)
///     .get_multi()
///     .await?;
/// ```
pub struct Selector<'s, T> {
    session: &'s dyn Session,
    table: Option<String>,
    columns: Vec<Selectable>,
    wheres: Vec<Predicate>,
    group_by: Vec<Column>,
    having: Vec<Predicate>,
    order_by: Vec<OrderBy>,
    limit: Option<i64>,
    offset: Option<i64>,
    _entity: PhantomData<fn() -> T>,
}

impl<'s, T: Entity> Selector<'s, T> {
    pub fn new(session: &'s dyn Session) -> Self {
        Self {
            session,
            table: None,
            columns: Vec::new(),
            wheres: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            _entity: PhantomData,
        }
    }

    /// Projection. Defaults to `*`.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Selectable>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Read from `table` (emitted verbatim) instead of the model's table.
    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Add a WHERE predicate; multiple calls are joined with `AND`.
    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.wheres.push(predicate);
        self
    }

    pub fn group_by(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.group_by.extend(columns);
        self
    }

    /// Add a HAVING predicate; multiple calls are joined with `AND`.
    pub fn having(mut self, predicate: Predicate) -> Self {
        self.having.push(predicate);
        self
    }

    pub fn order_by(mut self, order: impl IntoIterator<Item = OrderBy>) -> Self {
        self.order_by.extend(order);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// First matching row. Fails with `OrmError::NoRows` when there is none.
    pub async fn get(&self) -> OrmResult<T> {
        session::get_one::<T>(self.session, QueryType::Select, self).await
    }

    /// All matching rows.
    pub async fn get_multi(&self) -> OrmResult<Vec<T>> {
        session::get_all::<T>(self.session, QueryType::Select, self).await
    }
}

impl<T: Entity> QueryBuilder for Selector<'_, T> {
    fn build(&self) -> OrmResult<Query> {
        let core = self.session.core();
        let model = core.registry().get::<T>()?;
        let mut b = SqlBuilder::new(&model, core.dialect());

        b.push_str("SELECT ");
        b.build_selectables(&self.columns)?;
        b.push_str(" FROM ");
        b.build_table(self.table.as_deref());

        b.build_predicates("WHERE", &self.wheres, Clause::Where)?;

        if !self.group_by.is_empty() {
            b.push_str(" GROUP BY ");
            for (i, column) in self.group_by.iter().enumerate() {
                if i > 0 {
                    b.push(',');
                }
                b.build_column(column.name())?;
            }
        }

        b.build_predicates("HAVING", &self.having, Clause::Having)?;

        if !self.order_by.is_empty() {
            b.push_str(" ORDER BY ");
            for (i, order) in self.order_by.iter().enumerate() {
                if i > 0 {
                    b.push(',');
                }
                b.build_column(&order.column)?;
                b.push_str(if order.desc { " DESC" } else { " ASC" });
            }
        }

        if let Some(limit) = self.limit {
            b.push_str(" LIMIT ");
            b.push_arg(limit.into());
        }
        if let Some(offset) = self.offset {
            b.push_str(" OFFSET ");
            b.push_arg(offset.into());
        }

        Ok(b.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::AccessorKind;
    use crate::dialect::Dialect;
    use crate::error::OrmError;
    use crate::expr::{asc, avg, col, count, desc, max, not, raw};
    use crate::mock::MockDriver;
    use crate::session::{Db, DbOptions};
    use crate::test_util::{TEST_MODEL_COLUMNS, TestModel, mock_db, tom};
    use crate::value::Value;

    fn sql(q: Query) -> String {
        q.sql
    }

    #[test]
    fn test_select_all() {
        let (_, db) = mock_db(Dialect::MySql);
        let q = Selector::<TestModel>::new(&db).build().unwrap();
        assert_eq!(q.sql, "SELECT * FROM `test_model`;");
        assert!(q.args.is_empty());
    }

    #[test]
    fn test_select_where_and() {
        let (_, db) = mock_db(Dialect::MySql);
        let q = Selector::<TestModel>::new(&db)
            .where_(col("first_name").eq("Tom").and(col("age").gt(18)))
            .build()
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT * FROM `test_model` WHERE (`first_name` = ?) AND (`age` > ?);"
        );
        assert_eq!(q.args, vec![Value::Text("Tom".into()), Value::Int(18)]);
    }

    #[test]
    fn test_select_repeated_where_is_joined_with_and() {
        let (_, db) = mock_db(Dialect::MySql);
        let q = Selector::<TestModel>::new(&db)
            .where_(col("id").eq(12))
            .where_(col("age").le(30))
            .build()
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT * FROM `test_model` WHERE (`id` = ?) AND (`age` <= ?);"
        );
    }

    #[test]
    fn test_select_or_and_column_operand() {
        let (_, db) = mock_db(Dialect::MySql);
        let q = Selector::<TestModel>::new(&db)
            .where_(
                col("first_name")
                    .eq(col("last_name"))
                    .or(col("id").ne(3)),
            )
            .build()
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT * FROM `test_model` WHERE (`first_name` = `last_name`) OR (`id` != ?);"
        );
        assert_eq!(q.args, vec![Value::Int(3)]);
    }

    #[test]
    fn test_select_not() {
        let (_, db) = mock_db(Dialect::MySql);
        let q = Selector::<TestModel>::new(&db)
            .where_(not(col("first_name").eq("Tom")))
            .build()
            .unwrap();
        assert_eq!(q.sql, "SELECT * FROM `test_model` WHERE  NOT (`first_name` = ?);");
    }

    #[test]
    fn test_select_raw_predicate() {
        let (_, db) = mock_db(Dialect::MySql);
        let q = Selector::<TestModel>::new(&db)
            .where_(raw("`id`<?", vec![12.into()]).as_predicate())
            .build()
            .unwrap();
        assert_eq!(q.sql, "SELECT * FROM `test_model` WHERE `id`<?;");
        assert_eq!(q.args, vec![Value::Int(12)]);
    }

    #[test]
    fn test_select_raw_operand() {
        let (_, db) = mock_db(Dialect::MySql);
        let q = Selector::<TestModel>::new(&db)
            .where_(col("age").lt(raw("? + ?", vec![10.into(), 8.into()])))
            .build()
            .unwrap();
        assert_eq!(q.sql, "SELECT * FROM `test_model` WHERE `age` < ? + ?;");
        assert_eq!(q.args, vec![Value::Int(10), Value::Int(8)]);
    }

    #[test]
    fn test_select_column_alias() {
        let (_, db) = mock_db(Dialect::MySql);
        let q = Selector::<TestModel>::new(&db)
            .select([col("first_name").alias("my_name"), col("id")])
            .where_(col("first_name").alias("ignored").eq("Tom"))
            .build()
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT `first_name` AS `my_name`,`id` FROM `test_model` WHERE `first_name` = ?;"
        );
    }

    #[test]
    fn test_select_aggregates() {
        let (_, db) = mock_db(Dialect::MySql);
        let q = Selector::<TestModel>::new(&db)
            .select([avg("age").alias("avg_age"), count("id"), max("age")])
            .build()
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT AVG(`age`) AS `avg_age`,COUNT(`id`),MAX(`age`) FROM `test_model`;"
        );
    }

    #[test]
    fn test_having_drops_aggregate_alias() {
        let (_, db) = mock_db(Dialect::MySql);
        let q = Selector::<TestModel>::new(&db)
            .select([Selectable::from(col("age")), avg("id").alias("avg_id").into()])
            .group_by([col("age")])
            .having(avg("id").alias("avg_id").gt(10))
            .build()
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT `age`,AVG(`id`) AS `avg_id` FROM `test_model` GROUP BY `age` HAVING AVG(`id`) > ?;"
        );
    }

    #[test]
    fn test_select_raw_projection() {
        let (_, db) = mock_db(Dialect::MySql);
        let q = Selector::<TestModel>::new(&db)
            .select([Selectable::from(col("id")), raw("COUNT(DISTINCT `age`)", vec![]).into()])
            .build()
            .unwrap();
        assert_eq!(q.sql, "SELECT `id`,COUNT(DISTINCT `age`) FROM `test_model`;");
    }

    // ORDER BY precedes LIMIT/OFFSET; the reverse is rejected by MySQL, SQLite and Postgres
    #[test]
    fn test_select_group_having_order_limit_offset() {
        let (_, db) = mock_db(Dialect::MySql);
        let q = Selector::<TestModel>::new(&db)
            .select([col("age")])
            .where_(col("id").gt(0))
            .group_by([col("age")])
            .having(avg("id").gt(10))
            .order_by([desc("age"), asc("id")])
            .limit(10)
            .offset(5)
            .build()
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT `age` FROM `test_model` WHERE `id` > ? GROUP BY `age` HAVING AVG(`id`) > ? \
             ORDER BY `age` DESC,`id` ASC LIMIT ? OFFSET ?;"
        );
        assert_eq!(
            q.args,
            vec![
                Value::Int(0),
                Value::Int(10),
                Value::BigInt(10),
                Value::BigInt(5)
            ]
        );
    }

    #[test]
    fn test_select_aggregate_in_where_is_rejected() {
        let (_, db) = mock_db(Dialect::MySql);
        let err = Selector::<TestModel>::new(&db)
            .where_(avg("age").gt(10))
            .build()
            .unwrap_err();
        assert!(matches!(err, OrmError::UnsupportedExpression(_)));
    }

    #[test]
    fn test_select_from_is_verbatim() {
        let (_, db) = mock_db(Dialect::MySql);
        let q = Selector::<TestModel>::new(&db)
            .from("test_model_t")
            .build()
            .unwrap();
        assert_eq!(q.sql, "SELECT * FROM test_model_t;");
    }

    #[test]
    fn test_select_unknown_field() {
        let (_, db) = mock_db(Dialect::MySql);
        let err = Selector::<TestModel>::new(&db)
            .where_(col("invalid").eq(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, OrmError::UnknownField(ref f) if f == "invalid"));

        let err = Selector::<TestModel>::new(&db)
            .select([col("invalid")])
            .build()
            .unwrap_err();
        assert!(matches!(err, OrmError::UnknownField(_)));
    }

    #[test]
    fn test_select_build_is_repeatable() {
        let (_, db) = mock_db(Dialect::MySql);
        let selector = Selector::<TestModel>::new(&db).where_(col("id").eq(1));
        let first = selector.build().unwrap();
        let second = selector.build().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_select_sqlite_matches_mysql_syntax() {
        let (_, db) = mock_db(Dialect::Sqlite);
        let q = Selector::<TestModel>::new(&db)
            .where_(col("id").eq(1))
            .build()
            .unwrap();
        assert_eq!(sql(q), "SELECT * FROM `test_model` WHERE `id` = ?;");
    }

    #[test]
    fn test_select_postgres_numbers_placeholders() {
        let (_, db) = mock_db(Dialect::Postgres);
        let q = Selector::<TestModel>::new(&db)
            .where_(
                col("id")
                    .eq(1)
                    .and(raw("\"age\" BETWEEN ? AND ?", vec![18.into(), 30.into()]).as_predicate()),
            )
            .limit(3)
            .build()
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT * FROM \"test_model\" WHERE (\"id\" = $1) AND (\"age\" BETWEEN $2 AND $3) LIMIT $4;"
        );
        assert_eq!(q.args.len(), 4);
    }

    #[test]
    fn test_select_postgres_keeps_question_marks_in_literals() {
        let (_, db) = mock_db(Dialect::Postgres);
        let q = Selector::<TestModel>::new(&db)
            .where_(
                raw(
                    "\"first_name\" = 'who?' AND \"last_name\" <> 'it''s ?' AND \"age\" > ?",
                    vec![18.into()],
                )
                .as_predicate(),
            )
            .limit(1)
            .build()
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT * FROM \"test_model\" WHERE \"first_name\" = 'who?' \
             AND \"last_name\" <> 'it''s ?' AND \"age\" > $1 LIMIT $2;"
        );
        assert_eq!(q.args, vec![Value::Int(18), Value::BigInt(1)]);
    }

    #[tokio::test]
    async fn test_get_decodes_first_row() {
        let (mock, db) = mock_db(Dialect::MySql);
        mock.expect_rows(
            &TEST_MODEL_COLUMNS,
            vec![
                vec![1i64.into(), "Tom".into(), 18i8.into(), "Jerry".into()],
                vec![2i64.into(), "Ann".into(), 20i8.into(), Value::Null],
            ],
        );

        let got = Selector::<TestModel>::new(&db)
            .where_(col("id").eq(1))
            .get()
            .await
            .unwrap();
        assert_eq!(got, tom());
        assert_eq!(
            mock.statements()[0].sql,
            "SELECT * FROM `test_model` WHERE `id` = ?;"
        );
    }

    #[tokio::test]
    async fn test_get_no_rows() {
        let (mock, db) = mock_db(Dialect::MySql);
        mock.expect_rows(&TEST_MODEL_COLUMNS, vec![]);
        let err = Selector::<TestModel>::new(&db).get().await.unwrap_err();
        assert!(err.is_no_rows());
    }

    #[tokio::test]
    async fn test_get_multi_coerces_text_rows() {
        let (mock, db) = mock_db(Dialect::MySql);
        mock.expect_rows(
            &TEST_MODEL_COLUMNS,
            vec![
                vec!["1".into(), "Tom".into(), "18".into(), "Jerry".into()],
                vec!["2".into(), "Ann".into(), "21".into(), Value::Null],
            ],
        );

        let got = Selector::<TestModel>::new(&db).get_multi().await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0], tom());
        assert_eq!(got[1].age, 21);
        assert_eq!(got[1].last_name, None);
    }

    #[tokio::test]
    async fn test_get_multi_empty() {
        let (mock, db) = mock_db(Dialect::MySql);
        mock.expect_rows(&TEST_MODEL_COLUMNS, vec![]);
        let got = Selector::<TestModel>::new(&db).get_multi().await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn test_get_partial_projection_keeps_defaults() {
        let (mock, db) = mock_db(Dialect::MySql);
        mock.expect_rows(&["first_name"], vec![vec!["Tom".into()]]);
        let got = Selector::<TestModel>::new(&db)
            .select([col("first_name")])
            .get()
            .await
            .unwrap();
        assert_eq!(
            got,
            TestModel {
                first_name: "Tom".into(),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_get_unknown_result_column() {
        let (mock, db) = mock_db(Dialect::MySql);
        mock.expect_rows(&["id", "nickname"], vec![vec![1i64.into(), "t".into()]]);
        let err = Selector::<TestModel>::new(&db).get().await.unwrap_err();
        assert!(matches!(err, OrmError::UnknownColumn(ref c) if c == "nickname"));
    }

    #[tokio::test]
    async fn test_get_value_out_of_range() {
        let (mock, db) = mock_db(Dialect::MySql);
        mock.expect_rows(&["age"], vec![vec![1000i64.into()]]);
        let err = Selector::<TestModel>::new(&db).get().await.unwrap_err();
        assert!(matches!(err, OrmError::Decode { ref column, .. } if column == "age"));
    }

    #[tokio::test]
    async fn test_get_driver_error() {
        let (mock, db) = mock_db(Dialect::MySql);
        mock.expect_error("server has gone away");
        let err = Selector::<TestModel>::new(&db).get_multi().await.unwrap_err();
        assert!(matches!(err, OrmError::Driver(_)));
    }

    #[tokio::test]
    async fn test_get_build_error_never_reaches_driver() {
        let (mock, db) = mock_db(Dialect::MySql);
        let err = Selector::<TestModel>::new(&db)
            .where_(col("invalid").eq(1))
            .get()
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::UnknownField(_)));
        assert!(mock.statements().is_empty());
    }

    #[tokio::test]
    async fn test_get_with_unsafe_accessor() {
        let mock = MockDriver::new();
        let db = Db::with_options(
            mock.clone(),
            DbOptions::new().with_accessor(AccessorKind::Unsafe),
        );
        mock.expect_rows(
            &TEST_MODEL_COLUMNS,
            vec![vec!["1".into(), "Tom".into(), "18".into(), "Jerry".into()]],
        );
        let got = Selector::<TestModel>::new(&db).get().await.unwrap();
        assert_eq!(got, tom());
    }
}
