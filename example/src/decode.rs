use myro::{Connection, Decode, Result, query, types::Json};
use serde::{Deserialize, Serialize};
use time::{PrimitiveDateTime, macros::datetime};

#[derive(Decode)]
struct MyId(i32);

#[derive(Decode)]
struct SomeId<T>(T);

#[derive(Debug, Decode, PartialEq, Eq)]
enum Mood {
    Happy,
    Sad,
    #[sql(rename = "meh")]
    SoSo,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
struct Foo {
    id: i32,
}

pub async fn main() -> Result<()> {
    let mut conn = Connection::connect_env().await?;

    let (null,): (Option<String>,) = query("SELECT NULL", &mut conn).fetch_one().await?;

    assert!(null.is_none());

    let (my_id,): (MyId,) = query("SELECT 420", &mut conn).fetch_one().await?;

    assert_eq!(my_id.0, 420);

    let (some_id,): (SomeId<i64>,) = query("SELECT ?", &mut conn).bind(420i64).fetch_one().await?;

    assert_eq!(some_id.0, 420);

    // `ENUM`

    let (happy, soso): (Mood, Mood) = query("SELECT 'happy', 'meh'", &mut conn).fetch_one().await?;

    assert_eq!((happy, soso), (Mood::Happy, Mood::SoSo));

    // `time`

    let at = datetime!(2024-02-29 13:45:10.250);
    let (echo,): (PrimitiveDateTime,) = query("SELECT CAST(? AS DATETIME(3))", &mut conn)
        .bind(at)
        .fetch_one()
        .await?;

    assert_eq!(echo, at);

    // `json`

    let (Json(json),): (Json<Foo>,) = query("SELECT CAST(? AS JSON)", &mut conn)
        .bind(Json(Foo { id: 420 }))
        .fetch_one()
        .await?;

    assert_eq!(json, Foo { id: 420 });

    conn.close().await?;

    Ok(())
}
