//! MySQL Driver over the binary prepared statement protocol
//!
//! Every statement is prepared server side, its parameters are sent in binary
//! form and its rows are returned as typed binary rows.
//!
//! # Examples
//!
//! Single connection:
//!
//! ```no_run
//! use myro::Connection;
//!
//! # async fn app() -> myro::Result<()> {
//! let mut conn = Connection::connect_env().await?;
//!
//! let res = myro::query::<_, _, (i32,String)>("SELECT 420, ?", &mut conn)
//!     .bind("Foo")
//!     .fetch_one()
//!     .await?;
//!
//! assert_eq!(res.0,420);
//! assert_eq!(res.1.as_str(),"Foo");
//! # Ok(())
//! # }
//! ```
//!
//! Reusing prepared statement:
//!
//! ```no_run
//! # async fn app(mut conn: myro::Connection) -> myro::Result<()> {
//! let mut stmt = myro::prepare("INSERT INTO post(title) VALUES (?)", &mut conn).await?;
//!
//! for title in ["foo", "bar"] {
//!     let res = stmt.execute(&mut conn).bind(title).execute().await?;
//!     if let Some(summary) = res.summary() {
//!         println!("inserted {}", summary.last_insert_id);
//!     }
//! }
//!
//! stmt.release(&mut conn).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Streaming rows:
//!
//! ```no_run
//! # async fn app(mut conn: myro::Connection) -> myro::Result<()> {
//! let mut rows = myro::execute("SELECT id, title FROM post", &mut conn)
//!     .fetch()
//!     .await?;
//!
//! while let Some(row) = rows.fetch_next().await? {
//!     let title: String = row.try_get("title")?;
//!     println!("{title}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod common;
mod net;
mod ext;

// Protocol
pub mod mysql;

// Encoding
mod value;
pub mod encode;
pub mod types;

// Component
pub mod binding;
pub mod describe;
pub mod row;
pub mod fetch;
mod statement;
pub mod sql;

// Operation
mod lifecycle;
pub mod transport;
pub mod executor;
pub mod query;
pub mod transaction;

// Connection
pub mod connection;
#[cfg(feature = "tokio")]
pub mod shared;

mod error;


pub use value::{Value, ColumnKind};
pub use encode::Encode;
pub use row::{Row, FromRow, Decode, DecodeError};
pub use sql::Sql;
#[cfg(feature = "json")]
pub use types::Json;

pub use executor::Executor;
pub use connection::{Connection, Config, Charset};
#[cfg(feature = "tokio")]
pub use shared::SharedConnection;
pub use statement::PreparedStatement;
pub use lifecycle::{QueryResult, Summary};
pub use fetch::RowFetcher;
pub use transaction::Transaction;
#[doc(inline)]
pub use query::{query, execute, prepare};
#[doc(inline)]
pub use transaction::begin;
pub use error::{Error, ErrorKind, Result};

#[cfg(feature = "macros")]
pub use myro_macros::{FromRow, Decode, Table};
