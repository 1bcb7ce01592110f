#![allow(dead_code)]

use microrm::{
    AccessorKind, Assignable, Db, DbOptions, Deleter, Dialect, Entity, ExecResult, Inserter,
    MockDriver, ModelOption, OrmError, QueryBuilder, RawQuerier, Selectable, Selector, Updater, Value, assign,
    col, count, desc,
};

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[orm(table = "users")]
struct User {
    id: i64,
    #[orm(column = "user_name")]
    name: String,
    #[orm("column:mail")]
    email: Option<String>,
    login_count: u32,
}

#[derive(Entity, Debug, Default, Clone, PartialEq)]
struct OrderItem {
    order_id: i64,
    #[orm("column:")]
    sku_code: String,
}

#[derive(Entity, Debug, Default)]
struct BadTag {
    #[orm("column")]
    value: i32,
}

fn alice() -> User {
    User {
        id: 1,
        name: "alice".into(),
        email: Some("alice@example.com".into()),
        login_count: 3,
    }
}

fn mock_db(dialect: Dialect) -> (MockDriver, Db) {
    let mock = MockDriver::new();
    let db = Db::with_options(mock.clone(), DbOptions::new().with_dialect(dialect));
    (mock, db)
}

#[test]
fn derived_tags_drive_table_and_column_names() {
    let (_, db) = mock_db(Dialect::MySql);
    let q = Inserter::<User>::new(&db).values([alice()]).build().unwrap();
    assert_eq!(
        q.sql,
        "INSERT INTO `users` (`id`,`user_name`,`mail`,`login_count`) VALUES (?,?,?,?);"
    );
    assert_eq!(q.args[3], Value::UInt(3));

    let q = Selector::<OrderItem>::new(&db)
        .where_(col("sku_code").eq("A-1"))
        .build()
        .unwrap();
    assert_eq!(q.sql, "SELECT * FROM `order_item` WHERE `sku_code` = ?;");
}

#[test]
fn malformed_tag_fails_at_registration() {
    let (_, db) = mock_db(Dialect::MySql);
    let err = Selector::<BadTag>::new(&db).build().unwrap_err();
    assert!(matches!(err, OrmError::InvalidTagContent(ref t) if t == "column"));
}

#[test]
fn registration_options_override_names() {
    let (_, db) = mock_db(Dialect::Postgres);
    db.registry()
        .register::<User>([
            ModelOption::table_name("app.users"),
            ModelOption::column_name("email", "email_address"),
        ])
        .unwrap();

    let q = Updater::<User>::new(&db)
        .set([assign("email", Option::<String>::None)])
        .where_(col("name").eq("alice"))
        .build()
        .unwrap();
    assert_eq!(
        q.sql,
        "UPDATE \"app.users\" SET \"email_address\" = $1 WHERE \"user_name\" = $2;"
    );
}

#[test]
fn unknown_option_field_is_rejected() {
    let (_, db) = mock_db(Dialect::MySql);
    let err = db
        .registry()
        .register::<User>([ModelOption::column_name("nickname", "nick")])
        .unwrap_err();
    assert!(matches!(err, OrmError::UnknownField(_)));
}

#[tokio::test]
async fn crud_round_trip_against_mock() {
    let (mock, db) = mock_db(Dialect::MySql);
    mock.expect_exec(ExecResult::new(1).with_last_insert_id(1))
        .expect_rows(
            &["id", "user_name", "mail", "login_count"],
            vec![vec![
                Value::BigInt(1),
                "alice".into(),
                "alice@example.com".into(),
                Value::BigInt(3),
            ]],
        )
        .expect_exec(ExecResult::new(1))
        .expect_exec(ExecResult::new(1));

    let res = Inserter::<User>::new(&db).values([alice()]).exec().await.unwrap();
    assert_eq!(res.last_insert_id, Some(1));

    let got = Selector::<User>::new(&db)
        .where_(col("id").eq(1i64))
        .get()
        .await
        .unwrap();
    assert_eq!(got, alice());

    Updater::<User>::new(&db)
        .set([assign("login_count", 4u32)])
        .where_(col("id").eq(1i64))
        .exec()
        .await
        .unwrap();
    Deleter::<User>::new(&db)
        .where_(col("id").eq(1i64))
        .exec()
        .await
        .unwrap();

    let sql: Vec<String> = mock.statements().into_iter().map(|q| q.sql).collect();
    assert_eq!(
        sql,
        vec![
            "INSERT INTO `users` (`id`,`user_name`,`mail`,`login_count`) VALUES (?,?,?,?);",
            "SELECT * FROM `users` WHERE `id` = ?;",
            "UPDATE `users` SET `login_count` = ? WHERE `id` = ?;",
            "DELETE FROM `users` WHERE `id` = ?;",
        ]
    );
    assert_eq!(mock.pending(), 0);
}

#[tokio::test]
async fn both_accessors_decode_the_same_rows() {
    for accessor in [AccessorKind::Reflect, AccessorKind::Unsafe] {
        let mock = MockDriver::new();
        let db = Db::with_options(mock.clone(), DbOptions::new().with_accessor(accessor));
        mock.expect_rows(
            &["id", "user_name", "mail", "login_count"],
            vec![
                vec!["1".into(), "alice".into(), "alice@example.com".into(), "3".into()],
                vec!["2".into(), "bob".into(), Value::Null, "0".into()],
            ],
        );

        let users = Selector::<User>::new(&db)
            .order_by([desc("id")])
            .get_multi()
            .await
            .unwrap();
        assert_eq!(users[0], alice(), "{accessor:?}");
        assert_eq!(users[1].email, None, "{accessor:?}");
    }
}

#[tokio::test]
async fn unsafe_accessor_encodes_insert_values() {
    let mock = MockDriver::new();
    let db = Db::with_options(mock.clone(), DbOptions::new().use_unsafe_accessor());
    let q = Inserter::<User>::new(&db).values([alice()]).build().unwrap();
    assert_eq!(
        q.args,
        vec![
            Value::BigInt(1),
            Value::Text("alice".into()),
            Value::Text("alice@example.com".into()),
            Value::UInt(3),
        ]
    );
}

#[tokio::test]
async fn upsert_per_dialect() {
    let expected = [
        (
            Dialect::MySql,
            "INSERT INTO `users` (`id`,`user_name`,`mail`,`login_count`) VALUES (?,?,?,?) \
             ON DUPLICATE KEY UPDATE `login_count`=VALUES(`login_count`);",
        ),
        (
            Dialect::Sqlite,
            "INSERT INTO `users` (`id`,`user_name`,`mail`,`login_count`) VALUES (?,?,?,?) \
             ON CONFLICT (`id`) DO UPDATE SET `login_count`=EXCLUDED.`login_count`;",
        ),
        (
            Dialect::Postgres,
            "INSERT INTO \"users\" (\"id\",\"user_name\",\"mail\",\"login_count\") VALUES ($1,$2,$3,$4) \
             ON CONFLICT (\"id\") DO UPDATE SET \"login_count\"=EXCLUDED.\"login_count\";",
        ),
    ];

    for (dialect, sql) in expected {
        let (mock, db) = mock_db(dialect);
        mock.expect_exec(ExecResult::new(1));
        Inserter::<User>::new(&db)
            .values([alice()])
            .on_duplicate_key()
            .conflict_columns(["id"])
            .update([Assignable::from(col("login_count"))])
            .exec()
            .await
            .unwrap();
        assert_eq!(mock.statements()[0].sql, sql, "{dialect:?}");
    }
}

#[tokio::test]
async fn aggregate_into_partial_entity() {
    #[derive(Entity, Debug, Default)]
    #[orm(table = "users")]
    struct LoginStats {
        #[orm(column = "user_name")]
        name: String,
        logins: i64,
    }

    let (mock, db) = mock_db(Dialect::MySql);
    mock.expect_rows(&["user_name", "logins"], vec![vec!["alice".into(), 12i64.into()]]);

    let stats = Selector::<LoginStats>::new(&db)
        .select([
            Selectable::from(col("name")),
            Selectable::from(count("logins").alias("logins")),
        ])
        .group_by([col("name")])
        .having(count("logins").gt(10))
        .get_multi()
        .await
        .unwrap();
    assert_eq!(stats[0].logins, 12);
    assert_eq!(
        mock.statements()[0].sql,
        "SELECT `user_name`,COUNT(`logins`) AS `logins` FROM `users` GROUP BY `user_name` HAVING COUNT(`logins`) > ?;"
    );
}

#[tokio::test]
async fn raw_query_uses_entity_mapping() {
    let (mock, db) = mock_db(Dialect::MySql);
    mock.expect_rows(&["user_name"], vec![vec!["carol".into()]]);
    let user = RawQuerier::<User>::new(&db, "SELECT user_name FROM users LIMIT 1", vec![])
        .get()
        .await
        .unwrap();
    assert_eq!(user.name, "carol");
    assert_eq!(mock.statements()[0].sql, "SELECT user_name FROM users LIMIT 1");
}
