use myro::{Connection, QueryResult, Result, Row, begin, execute, prepare, query};

pub async fn main() -> Result<()> {
    let mut conn = Connection::connect_env().await?;

    // Execute

    execute("DROP TEMPORARY TABLE IF EXISTS myro", &mut conn).execute().await?;
    execute(
        "CREATE TEMPORARY TABLE myro(id INT AUTO_INCREMENT PRIMARY KEY, name TEXT)",
        &mut conn,
    )
    .execute()
    .await?;

    let res = execute("INSERT INTO myro(name) VALUES (?)", &mut conn)
        .bind("Deez")
        .execute()
        .await?;

    let summary = res.summary().unwrap();
    assert_eq!(summary.affected_rows, 1);
    assert_eq!(summary.last_insert_id, 1);
    drop(res);

    execute("INSERT INTO myro(name) VALUES ('Foo')", &mut conn).execute().await?;

    // Statement that affects nothing

    let res = execute("DELETE FROM myro WHERE id < 0", &mut conn).execute().await?;
    assert!(matches!(res, QueryResult::SuccessNoData));
    drop(res);

    // Queries

    let datas = query::<_, _, (i32, String)>("SELECT * FROM myro", &mut conn)
        .fetch_all()
        .await?;

    assert_eq!(datas.len(), 2);

    let (_id, name) = query::<_, _, (i32, String)>("SELECT * FROM myro LIMIT 1", &mut conn)
        .fetch_one()
        .await?;

    assert_eq!(name.as_str(), "Deez");
    assert_eq!(name, datas[0].1);

    let data = query::<_, _, (i32, String)>("SELECT * FROM myro LIMIT 0", &mut conn)
        .fetch_optional()
        .await?;

    assert!(data.is_none());

    let mut rows = execute("SELECT * FROM myro", &mut conn).fetch().await?;

    while let Some(row) = rows.fetch_next().await? {
        let _name: String = row.try_get("name")?;
    }
    drop(rows);

    let datas = query::<_, _, Row>("SELECT * FROM myro", &mut conn).fetch_all().await?;

    assert_eq!(datas[0].try_get::<_, String>("name")?.as_str(), "Deez");

    // Prepared statement

    let mut stmt = prepare("SELECT name FROM myro WHERE id = ?", &mut conn).await?;

    for id in 1..=2 {
        let (name,) = stmt.query::<_, (String,)>(&mut conn).bind(id).fetch_one().await?;
        tracing::info!(id, name, "found");
    }

    stmt.release(&mut conn).await?;

    // Transaction

    let mut tx = begin(&mut conn).await?;
    execute("INSERT INTO myro(name) VALUES ('Foo')", &mut tx).execute().await?;
    tx.create_savepoint("before_bar").await?;
    execute("INSERT INTO myro(name) VALUES ('Bar')", &mut tx).execute().await?;
    tx.rollback_to_savepoint("before_bar").await?;
    tx.commit().await?;

    let (count,) = query::<_, _, (i64,)>("SELECT COUNT(*) FROM myro WHERE name = 'Bar'", &mut conn)
        .fetch_one()
        .await?;

    assert_eq!(count, 0);

    // Error case

    execute("", &mut conn).execute().await.unwrap_err();
    execute("SELECT foo", &mut conn).execute().await.unwrap_err();

    let _err = query::<_, _, (i32, String)>("SELECT * FROM myro LIMIT 0", &mut conn)
        .fetch_one()
        .await
        .unwrap_err();

    conn.close().await?;

    Ok(())
}
