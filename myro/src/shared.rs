//! The [`SharedConnection`] type.
use bytes::Bytes;
use std::{
    fmt, io,
    ops::{Deref, DerefMut},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, ready},
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Config, Connection, Result,
    executor::Executor,
    mysql::FrontendProtocol,
    transport::MyTransport,
};

/// A [`Connection`] shared between tasks.
///
/// Each operation locks the connection for its whole duration, including the
/// life of a returned result set, so operations from clones are serialized.
///
/// # Example
///
/// ```no_run
/// # async fn app() -> myro::Result<()> {
/// let conn = myro::SharedConnection::connect_env().await?;
///
/// let mut handles = vec![];
///
/// for i in 0..4 {
///     let conn = conn.clone();
///     handles.push(tokio::spawn(async move {
///         myro::execute("INSERT INTO foo(id) VALUES (?)", &conn)
///             .bind(i)
///             .execute()
///             .await
///             .map(|_| ())
///     }));
/// }
///
/// for h in handles {
///     h.await.unwrap()?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SharedConnection {
    inner: Arc<Mutex<Connection>>,
}

impl SharedConnection {
    pub fn new(conn: Connection) -> Self {
        Self { inner: Arc::new(Mutex::new(conn)) }
    }

    /// Perform a startup with url.
    pub async fn connect(url: &str) -> Result<Self> {
        Connection::connect(url).await.map(Self::new)
    }

    /// Perform a startup with config from environment variable.
    pub async fn connect_env() -> Result<Self> {
        Connection::connect_env().await.map(Self::new)
    }

    pub async fn connect_with(config: Config) -> Result<Self> {
        Connection::connect_with(config).await.map(Self::new)
    }

    /// Wait for exclusive access to the connection.
    pub async fn lock(&self) -> SharedGuard {
        SharedGuard { conn: self.inner.clone().lock_owned().await }
    }

    /// Returns the connection if this is the last handle.
    pub fn try_unwrap(self) -> Result<Connection, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => Ok(mutex.into_inner()),
            Err(inner) => Err(Self { inner }),
        }
    }
}

impl fmt::Debug for SharedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedConnection")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}

impl Executor for SharedConnection {
    type Transport = SharedGuard;

    type Future = Acquire;

    fn connection(self) -> Self::Future {
        Acquire::new(self.inner)
    }
}

impl Executor for &SharedConnection {
    type Transport = SharedGuard;

    type Future = Acquire;

    fn connection(self) -> Self::Future {
        Acquire::new(self.inner.clone())
    }
}

/// Future returned from [`SharedConnection`] implementation of
/// [`Executor::connection`].
pub struct Acquire {
    lock: Pin<Box<dyn Future<Output = OwnedMutexGuard<Connection>> + Send>>,
}

impl Acquire {
    fn new(inner: Arc<Mutex<Connection>>) -> Self {
        Self { lock: Box::pin(inner.lock_owned()) }
    }
}

impl Future for Acquire {
    type Output = Result<SharedGuard>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let conn = ready!(self.lock.as_mut().poll(cx));
        Poll::Ready(Ok(SharedGuard { conn }))
    }
}

impl fmt::Debug for Acquire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Acquire")
    }
}

/// Exclusive access to a [`SharedConnection`], released on drop.
#[derive(Debug)]
pub struct SharedGuard {
    conn: OwnedMutexGuard<Connection>,
}

impl Deref for SharedGuard {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for SharedGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl MyTransport for SharedGuard {
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        Connection::poll_flush(&mut self.conn, cx)
    }

    fn poll_recv(&mut self, cx: &mut Context) -> Poll<Result<Bytes>> {
        Connection::poll_recv(&mut self.conn, cx)
    }

    fn send<F: FrontendProtocol>(&mut self, message: F) {
        Connection::send(&mut self.conn, message)
    }

    fn send_continue<F: FrontendProtocol>(&mut self, message: F) {
        Connection::send_continue(&mut self.conn, message)
    }

    fn drain_request(&mut self) {
        Connection::drain_request(&mut self.conn)
    }

    fn discard_response(&mut self) {
        Connection::discard_response(&mut self.conn)
    }

    fn connection_id(&self) -> u32 {
        Connection::connection_id(&self.conn)
    }

    fn is_connected(&self) -> bool {
        Connection::is_connected(&self.conn)
    }

    fn in_transaction(&self) -> bool {
        MyTransport::in_transaction(&*self.conn)
    }

    fn set_transaction(&mut self, active: bool) {
        MyTransport::set_transaction(&mut *self.conn, active)
    }
}
