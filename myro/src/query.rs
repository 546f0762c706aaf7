//! Query API types.
//!
//! ```no_run
//! # async fn app(mut conn: myro::Connection) -> myro::Result<()> {
//! let name = myro::query::<_, _, (String,)>("SELECT name FROM users WHERE id = ?", &mut conn)
//!     .bind(1)
//!     .fetch_one()
//!     .await?;
//!
//! let mut stmt = myro::prepare("INSERT INTO logs(line) VALUES (?)", &mut conn).await?;
//! for line in ["foo", "bar"] {
//!     stmt.execute(&mut conn).bind(line).execute().await?;
//! }
//! stmt.release(&mut conn).await?;
//! # Ok(())
//! # }
//! ```
use std::marker::PhantomData;

use crate::{
    Result, Row,
    encode::Encode,
    executor::Executor,
    fetch::{RowFetcher, StatementSlot},
    lifecycle::{self, Executed, QueryResult},
    row::{FromRow, RowNotFound},
    sql::{PrepareRequest, Sql},
    statement::PreparedStatement,
    value::Value,
};

/// Entrypoint of the query API.
///
/// The statement is prepared, executed and released within one call.
pub fn query<SQL: Sql, Exe, R>(sql: SQL, exe: Exe) -> Query<'static, Exe, R> {
    Query::new(Source::Sql(PrepareRequest::new(&sql)), exe)
}

/// Same as [`query`] with [`Row`] as the output.
pub fn execute<SQL: Sql, Exe>(sql: SQL, exe: Exe) -> Query<'static, Exe, Row> {
    Query::new(Source::Sql(PrepareRequest::new(&sql)), exe)
}

/// Prepare a statement for repeated execution.
///
/// The returned statement must be released with [`PreparedStatement::release`].
pub async fn prepare<SQL: Sql, Exe: Executor>(sql: SQL, exe: Exe) -> Result<PreparedStatement> {
    let request = PrepareRequest::new(&sql)?;
    let mut io = exe.connection().await?;
    lifecycle::prepare(&mut io, request).await
}

impl PreparedStatement {
    /// Execute this statement, see [`Query`].
    pub fn execute<Exe>(&mut self, exe: Exe) -> Query<'_, Exe, Row> {
        Query::new(Source::Prepared(self), exe)
    }

    /// Execute this statement with typed output, see [`Query`].
    pub fn query<Exe, R>(&mut self, exe: Exe) -> Query<'_, Exe, R> {
        Query::new(Source::Prepared(self), exe)
    }
}

#[derive(Debug)]
enum Source<'s> {
    /// Invalid statement is reported on execution, without round trip.
    Sql(Result<PrepareRequest>),
    Prepared(&'s mut PreparedStatement),
}

/// The query API.
#[derive(Debug)]
#[must_use = "query do nothing unless executed or fetched"]
pub struct Query<'s, Exe, R> {
    source: Source<'s>,
    exe: Exe,
    params: Vec<Option<Value>>,
    _p: PhantomData<R>,
}

impl<'s, Exe, R> Query<'s, Exe, R> {
    fn new(source: Source<'s>, exe: Exe) -> Self {
        Self { source, exe, params: Vec::new(), _p: PhantomData }
    }

    /// Bind query parameter, in placeholder order.
    pub fn bind<V: Encode>(mut self, value: V) -> Self {
        self.params.push(value.encode());
        self
    }

    /// Bind multiple query parameters.
    pub fn bind_all<I>(mut self, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Encode,
    {
        self.params.extend(values.into_iter().map(Encode::encode));
        self
    }
}

impl<'s, Exe: Executor, R> Query<'s, Exe, R> {
    async fn run(self) -> Result<Executed<'s, Exe::Transport>> {
        let Self { source, exe, params, .. } = self;

        match source {
            Source::Sql(request) => {
                let request = request?;
                let mut io = exe.connection().await?;
                let stmt = lifecycle::prepare(&mut io, request).await?;
                lifecycle::execute(io, StatementSlot::Owned(stmt), &params).await
            }
            Source::Prepared(stmt) => {
                let io = exe.connection().await?;
                lifecycle::execute(io, StatementSlot::Borrowed(stmt), &params).await
            }
        }
    }

    /// Execute the statement.
    ///
    /// A returned [`QueryResult::ResultSet`] holds the connection until it
    /// is finished or dropped.
    pub async fn execute(self) -> Result<QueryResult<'s, Exe::Transport>> {
        Ok(self.run().await?.into_result())
    }

    /// Fetch rows one at a time.
    ///
    /// Statement without result set returns an empty fetcher.
    pub async fn fetch(self) -> Result<RowFetcher<'s, Exe::Transport>> {
        Ok(self.run().await?.into_fetcher())
    }
}

impl<Exe: Executor, R: FromRow> Query<'_, Exe, R> {
    /// Fetch all rows into [`Vec`].
    pub async fn fetch_all(self) -> Result<Vec<R>> {
        let mut fetcher = self.fetch().await?;
        let mut rows = vec![];
        while let Some(row) = fetcher.fetch_next().await? {
            rows.push(R::from_row(row)?);
        }
        Ok(rows)
    }

    /// Fetch one row, remaining rows are discarded.
    pub async fn fetch_one(self) -> Result<R> {
        match self.fetch_optional().await? {
            Some(row) => Ok(row),
            None => Err(RowNotFound.into()),
        }
    }

    /// Optionally fetch one row, remaining rows are discarded.
    pub async fn fetch_optional(self) -> Result<Option<R>> {
        let mut fetcher = self.fetch().await?;
        let row = fetcher.fetch_next().await?;
        fetcher.close();
        match row {
            Some(row) => Ok(Some(R::from_row(row)?)),
            None => Ok(None),
        }
    }
}
