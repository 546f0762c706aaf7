//! Transaction commands and the [`Transaction`] type.
//!
//! Transaction state is tracked by the transport, so invalid transition is
//! rejected without round trip.
use bytes::Bytes;
use std::{
    io,
    task::{Context, Poll},
};

use crate::{
    Connection, Result,
    common::verbose,
    error::{ConnectionClosed, TransactionError},
    executor::Executor,
    mysql::{FrontendProtocol, OkPacket, frontend},
    sql::QueryBuilder,
    transport::{MyTransport, MyTransportExt},
};

/// Run a text protocol command which responds with `OK`.
async fn command<IO: MyTransport>(io: &mut IO, sql: &str) -> Result<OkPacket> {
    if !io.is_connected() {
        return Err(ConnectionClosed.into());
    }
    verbose!(sql, "command");
    io.send(frontend::Query { sql });
    io.flush().await?;
    io.recv_as::<OkPacket>().await
}

fn ensure_active<IO: MyTransport>(io: &IO) -> Result<(), TransactionError> {
    match io.in_transaction() {
        true => Ok(()),
        false => Err(TransactionError::NotStarted),
    }
}

pub(crate) async fn start_transaction<IO: MyTransport>(io: &mut IO) -> Result<()> {
    if io.in_transaction() {
        return Err(TransactionError::AlreadyStarted.into());
    }
    command(io, "START TRANSACTION").await?;
    io.set_transaction(true);
    Ok(())
}

pub(crate) async fn commit<IO: MyTransport>(io: &mut IO) -> Result<()> {
    ensure_active(io)?;
    command(io, "COMMIT").await?;
    io.set_transaction(false);
    Ok(())
}

pub(crate) async fn rollback<IO: MyTransport>(io: &mut IO) -> Result<()> {
    ensure_active(io)?;
    command(io, "ROLLBACK").await?;
    io.set_transaction(false);
    Ok(())
}

async fn savepoint<IO: MyTransport>(io: &mut IO, prefix: &str, name: &str) -> Result<()> {
    ensure_active(io)?;
    let sql = format!("{prefix} {}", QueryBuilder::MYSQL.quote_identifier(name));
    command(io, &sql).await?;
    Ok(())
}

impl Connection {
    /// Start a transaction.
    ///
    /// Fails with [`TransactionError::AlreadyStarted`] if one is active.
    pub async fn start_transaction(&mut self) -> Result<()> {
        start_transaction(self).await
    }

    /// Commit the active transaction.
    pub async fn commit(&mut self) -> Result<()> {
        commit(self).await
    }

    /// Rollback the active transaction.
    pub async fn rollback(&mut self) -> Result<()> {
        rollback(self).await
    }

    pub async fn create_savepoint(&mut self, name: &str) -> Result<()> {
        savepoint(self, "SAVEPOINT", name).await
    }

    pub async fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        savepoint(self, "ROLLBACK TO SAVEPOINT", name).await
    }

    pub async fn release_savepoint(&mut self, name: &str) -> Result<()> {
        savepoint(self, "RELEASE SAVEPOINT", name).await
    }
}

/// Begin a transaction.
///
/// See [`Transaction`].
pub async fn begin<E: Executor>(exe: E) -> Result<Transaction<E::Transport>> {
    let mut io = exe.connection().await?;
    start_transaction(&mut io).await?;
    Ok(Transaction::new(io))
}

/// An RAII implementation of transaction scope.
///
/// To begin a transaction, use [`begin`] function.
///
/// To commit transaction, use [`Transaction::commit`].
///
/// If not commited, when this structure is dropped, transaction will be
/// rolled back along the next command.
///
/// # Example
///
/// ```no_run
/// # async fn test(mut conn: myro::Connection) -> myro::Result<()> {
/// let mut tx = myro::begin(&mut conn).await?;
///
/// myro::execute("INSERT INTO post(name) VALUES ('foo')", &mut tx)
///     .execute()
///     .await?;
///
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Transaction<IO: MyTransport> {
    io: IO,
}

impl<IO: MyTransport> Transaction<IO> {
    pub(crate) fn new(io: IO) -> Self {
        Self { io }
    }

    /// Commit transaction.
    pub async fn commit(mut self) -> Result<()> {
        commit(&mut self.io).await
    }

    /// Rollback transaction.
    pub async fn rollback(mut self) -> Result<()> {
        rollback(&mut self.io).await
    }

    pub async fn create_savepoint(&mut self, name: &str) -> Result<()> {
        savepoint(&mut self.io, "SAVEPOINT", name).await
    }

    pub async fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        savepoint(&mut self.io, "ROLLBACK TO SAVEPOINT", name).await
    }

    pub async fn release_savepoint(&mut self, name: &str) -> Result<()> {
        savepoint(&mut self.io, "RELEASE SAVEPOINT", name).await
    }
}

impl<IO: MyTransport> Drop for Transaction<IO> {
    fn drop(&mut self) {
        if self.io.in_transaction() && self.io.is_connected() {
            verbose!("transaction dropped, rolling back");
            self.io.send(frontend::Query { sql: "ROLLBACK" });
            self.io.discard_response();
            self.io.set_transaction(false);
        }
    }
}

impl<IO: MyTransport> MyTransport for Transaction<IO> {
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        IO::poll_flush(&mut self.io, cx)
    }

    fn poll_recv(&mut self, cx: &mut Context) -> Poll<Result<Bytes>> {
        IO::poll_recv(&mut self.io, cx)
    }

    fn send<F: FrontendProtocol>(&mut self, message: F) {
        IO::send(&mut self.io, message)
    }

    fn send_continue<F: FrontendProtocol>(&mut self, message: F) {
        IO::send_continue(&mut self.io, message)
    }

    fn drain_request(&mut self) {
        IO::drain_request(&mut self.io)
    }

    fn discard_response(&mut self) {
        IO::discard_response(&mut self.io)
    }

    fn connection_id(&self) -> u32 {
        IO::connection_id(&self.io)
    }

    fn is_connected(&self) -> bool {
        IO::is_connected(&self.io)
    }

    fn in_transaction(&self) -> bool {
        IO::in_transaction(&self.io)
    }

    fn set_transaction(&mut self, active: bool) {
        IO::set_transaction(&mut self.io, active)
    }
}
