//! Tests against a live server, skipped when `DATABASE_URL` is not set.
use myro::{
    Connection, ErrorKind, QueryResult, Value, begin, execute, prepare, query,
    sql::{ColumnDef, Insert, Table},
};
use time::macros::{date, datetime, time};

async fn connect() -> Option<Connection> {
    let url = std::env::var("DATABASE_URL").ok()?;
    Some(Connection::connect(&url).await.unwrap())
}

macro_rules! live {
    () => {
        match connect().await {
            Some(conn) => conn,
            None => {
                eprintln!("DATABASE_URL is not set, skipped");
                return;
            }
        }
    };
}

#[tokio::test]
async fn scalar_round_trip() {
    let mut conn = live!();

    execute(
        "CREATE TEMPORARY TABLE scalars(
            a TINYINT, b SMALLINT UNSIGNED, c INT, d BIGINT UNSIGNED, e FLOAT, f DOUBLE,
            g VARCHAR(64), h VARBINARY(64), i TINYINT(1), j DATE, k TIME, l DATETIME
        )",
        &mut conn,
    )
    .execute()
    .await
    .unwrap();

    execute("INSERT INTO scalars VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)", &mut conn)
        .bind(-8i8)
        .bind(16u16)
        .bind(-32i32)
        .bind(u64::MAX)
        .bind(1.5f32)
        .bind(2.25f64)
        .bind("mysql")
        .bind(&[0u8, 255, 7])
        .bind(true)
        .bind(date!(2024 - 02 - 29))
        .bind(time!(23:59:58))
        .bind(datetime!(2024-02-29 13:45:10))
        .execute()
        .await
        .unwrap();

    let numbers = query::<_, _, (i8, u16, i32, u64, f32, f64)>("SELECT a, b, c, d, e, f FROM scalars", &mut conn)
        .fetch_one()
        .await
        .unwrap();
    assert_eq!(numbers, (-8, 16, -32, u64::MAX, 1.5, 2.25));

    let (g, h, i, j, k, l) = query::<_, _, (String, Vec<u8>, bool, time::Date, time::Time, time::PrimitiveDateTime)>(
        "SELECT g, h, i, j, k, l FROM scalars",
        &mut conn,
    )
    .fetch_one()
    .await
    .unwrap();
    assert_eq!(g, "mysql");
    assert_eq!(h, [0, 255, 7]);
    assert!(i);
    assert_eq!(j, date!(2024 - 02 - 29));
    assert_eq!(k, time!(23:59:58));
    assert_eq!(l, datetime!(2024-02-29 13:45:10));

    conn.close().await.unwrap();
}

#[tokio::test]
async fn null_and_long_time() {
    let mut conn = live!();

    let row = execute("SELECT ?, CAST('-838:59:59' AS TIME), CAST(1.10 AS DECIMAL(4,2))", &mut conn)
        .bind(None::<i32>)
        .fetch_one()
        .await
        .unwrap();

    assert_eq!(row.values()[0], None);
    assert_eq!(row.values()[1], Some(Value::Text("-838:59:59".into())));
    assert_eq!(row.values()[2], Some(Value::Text("1.10".into())));

    conn.close().await.unwrap();
}

#[tokio::test]
async fn buffer_reuse_insert() {
    let mut conn = live!();

    execute("CREATE TEMPORARY TABLE lines(id INT AUTO_INCREMENT PRIMARY KEY, line TEXT)", &mut conn)
        .execute()
        .await
        .unwrap();

    let lines = ["a", "a much longer line than the first one", "b", ""];
    let mut stmt = prepare("INSERT INTO lines(line) VALUES (?)", &mut conn).await.unwrap();
    for line in lines {
        let res = stmt.execute(&mut conn).bind(line).execute().await.unwrap();
        assert_eq!(res.summary().unwrap().affected_rows, 1);
    }
    stmt.release(&mut conn).await.unwrap();
    stmt.release(&mut conn).await.unwrap();

    let err = stmt.execute(&mut conn).bind("x").execute().await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Released(_)));

    let stored = query::<_, _, (String,)>("SELECT line FROM lines ORDER BY id", &mut conn)
        .fetch_all()
        .await
        .unwrap();
    assert_eq!(stored.into_iter().map(|(l,)| l).collect::<Vec<_>>(), lines);

    conn.close().await.unwrap();
}

#[tokio::test]
async fn return_generated_id() {
    let mut conn = live!();

    execute("CREATE TEMPORARY TABLE users(user_id INT AUTO_INCREMENT PRIMARY KEY, name TEXT)", &mut conn)
        .execute()
        .await
        .unwrap();
    execute("INSERT INTO users(name) VALUES ('first')", &mut conn).execute().await.unwrap();

    let users = Table::new("users")
        .column(ColumnDef::new("user_id").primary_key().auto_increment())
        .column(ColumnDef::new("name"));

    let insert = Insert::into(&users).columns(["name"]).return_id();
    let (id,) = query::<_, _, (u64,)>(insert, &mut conn).bind("second").fetch_one().await.unwrap();
    assert_eq!(id, 2);

    let insert = Insert::into(&users).columns(["name"]).rows(2).return_id();
    let row = execute(insert, &mut conn).bind("third").bind("fourth").fetch_one().await.unwrap();
    assert_eq!(row.columns()[0].name(), "user_id");
    // first id of the inserted rows
    assert_eq!(row.try_get::<_, u64>(0).unwrap(), 3);

    conn.close().await.unwrap();
}

#[tokio::test]
async fn strict_truncation_and_count_mismatch() {
    let mut conn = live!();

    execute("SET SESSION sql_mode = 'STRICT_ALL_TABLES'", &mut conn).execute().await.unwrap();
    execute("CREATE TEMPORARY TABLE short(s VARCHAR(3))", &mut conn).execute().await.unwrap();

    let err = execute("INSERT INTO short VALUES (?)", &mut conn)
        .bind("too long")
        .execute()
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Database(_)));

    let err = execute("INSERT INTO short VALUES (?)", &mut conn).execute().await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::ParameterCountMismatch(_)));

    let err = execute("SELEKT 1", &mut conn).execute().await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Syntax(_)));

    // connection is still usable
    let res = execute("DELETE FROM short", &mut conn).execute().await.unwrap();
    assert!(matches!(res, QueryResult::SuccessNoData));
    drop(res);

    conn.close().await.unwrap();
}

#[tokio::test]
async fn partial_fetch_and_transaction() {
    let mut conn = live!();

    execute("CREATE TEMPORARY TABLE n(v INT) ENGINE=InnoDB", &mut conn).execute().await.unwrap();
    execute("INSERT INTO n VALUES (1), (2), (3)", &mut conn).execute().await.unwrap();

    {
        let mut rows = execute("SELECT v FROM n ORDER BY v", &mut conn).fetch().await.unwrap();
        let first = rows.fetch_next().await.unwrap().unwrap();
        assert_eq!(first.try_get::<_, i32>(0).unwrap(), 1);
        rows.close();
        assert!(rows.fetch_next().await.unwrap().is_none());
    }

    let tx = begin(&mut conn).await.unwrap();
    drop(tx);

    let mut tx = begin(&mut conn).await.unwrap();
    execute("DELETE FROM n", &mut tx).execute().await.unwrap();
    tx.rollback().await.unwrap();

    let (count,) = query::<_, _, (i64,)>("SELECT COUNT(*) FROM n", &mut conn).fetch_one().await.unwrap();
    assert_eq!(count, 3);

    conn.close().await.unwrap();
}
