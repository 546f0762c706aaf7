use std::{env::var, time::Duration};
use myro::{Config, Connection, Result, SharedConnection, query};

pub async fn main() -> Result<()> {
    let mut conn = Connection::connect(&var("DATABASE_URL").unwrap()).await?;
    query::<_, _, ()>("SELECT 1", &mut conn).fetch_all().await?;
    conn.ping().await?;
    conn.close().await?;

    let mut conn = Connection::connect_env().await?;
    tracing::info!(version = conn.server_version(), id = conn.connection_id(), "connected");
    conn.close().await?;

    let config = Config::from_env().connect_timeout(Duration::from_secs(3));
    let mut conn = Connection::connect_with(config).await?;
    conn.close().await?;

    let shared = SharedConnection::connect_env().await?;
    query::<_, _, ()>("SELECT 1", &shared).fetch_all().await?;
    drop(shared);

    // wrong password
    let config = Config::from_env().password("definitely-not-the-password");
    let err = Connection::connect_with(config).await.unwrap_err();
    assert_eq!(err.as_server_error().map(|e| e.code()), Some(1045));

    Ok(())
}
