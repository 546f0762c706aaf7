use myro::{FromRow, Result, SharedConnection, execute, query};
use tracing::{Instrument, trace_span};

// automatically extract query result
#[derive(Debug, FromRow)]
struct Post {
    #[allow(unused)]
    id: i32,
    name: String,
}

pub async fn main() -> Result<()> {
    // will read the `DATABASE_URL` environment variable
    let conn = SharedConnection::connect_env().await?;
    let mut handles = vec![];

    execute("DROP TABLE IF EXISTS post", &conn).execute().await?;

    // execute a statement
    execute("CREATE TABLE post(id INT AUTO_INCREMENT PRIMARY KEY, name TEXT)", &conn)
        .execute()
        .await?;

    for id in 0..24 {
        // cloning is cheap and share the same connection
        let conn = conn.clone();

        handles.push(tokio::spawn(async move {
            execute("INSERT INTO post(name) VALUES (?)", &conn)
                .bind(format!("thread{id}"))
                .execute()
                .await
                .map(|res| res.summary())
        }.instrument(trace_span!("thread",id))));
    }

    for h in handles {
        h.await.unwrap()?;
    }

    // extract query result
    let posts = query::<_, _, Post>("SELECT * FROM post", &conn)
        .fetch_all()
        .await?;

    assert!(posts.iter().any(|e| e.name.as_str() == "thread23"));
    assert_eq!(posts.len(), 24);

    execute("DROP TABLE post", &conn).execute().await?;

    Ok(())
}
