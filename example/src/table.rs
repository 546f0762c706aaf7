#![allow(dead_code)]
use myro::{
    Connection, Result, Table, execute,
    sql::{Entity, Insert, QueryBuilder, Sql},
};
use time::PrimitiveDateTime;

#[derive(Table)]
struct BlogPost {
    #[sql(id)]
    id: i64,
    title: String,
    #[sql(timestamp)]
    created_at: PrimitiveDateTime,
    #[sql(skip)]
    cached: Option<String>,
}

#[derive(Table)]
#[sql("foo_bar")]
struct Renamed {
    #[sql(rename = "bar")]
    foo: i32,
}

pub async fn main() -> Result<()> {
    let table = BlogPost::table();

    assert_eq!(table.name(), "blog_post");
    assert_eq!(table.columns().len(), 3);
    assert_eq!(
        Insert::into(&table).columns(["title", "created_at"]).sql(&QueryBuilder::MYSQL),
        "INSERT INTO `blog_post` (`title`, `created_at`) VALUES (?, ?)"
    );
    assert_eq!(Renamed::table().name(), "foo_bar");
    assert!(Renamed::table().get("bar").is_some());

    let mut conn = Connection::connect_env().await?;

    execute(
        "CREATE TEMPORARY TABLE blog_post(id BIGINT AUTO_INCREMENT PRIMARY KEY, title TEXT, created_at DATETIME)",
        &mut conn,
    )
    .execute()
    .await?;

    let insert = Insert::into(&table).columns(["title", "created_at"]).return_id();

    let (id,): (i64,) = myro::query(insert, &mut conn)
        .bind("hello")
        .bind(time::macros::datetime!(2024-01-01 00:00))
        .fetch_one()
        .await?;

    assert_eq!(id, 1);

    conn.close().await?;

    Ok(())
}
