//! MySQL Connection.
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::{
    fmt, io,
    task::{Context, Poll, ready},
};

use crate::{
    Result,
    common::{ByteStr, verbose},
    error::ConnectionClosed,
    mysql::{BackendProtocol, FrontendProtocol, MAX_PACKET_LEN, OkPacket, ServerError, frontend, header},
    net::Socket,
    transport::{Discard, MyTransport, MyTransportExt},
};

mod config;
mod startup;

pub use config::{Charset, Config, ParseError};

const DEFAULT_BUF_CAPACITY: usize = 1024;

/// A single connection to mysql server.
///
/// Operations are performed one at a time, see
/// [`SharedConnection`][crate::SharedConnection] to share it between tasks.
#[derive(Debug)]
pub struct Connection {
    socket: Socket,
    read_buf: BytesMut,
    write_buf: BytesMut,
    /// Sequence id of the next packet.
    seq: u8,
    discard: Discard,
    connection_id: u32,
    server_version: ByteStr,
    capabilities: u32,
    in_transaction: bool,
    closed: bool,
}

impl Connection {
    /// Perform a startup with url.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(Config::parse(url)?).await
    }

    /// Perform a startup with config from environment variable.
    ///
    /// See [`Config::from_env`] for more details on env.
    pub async fn connect_env() -> Result<Self> {
        Self::connect_with(Config::from_env()).await
    }

    /// Perform a startup with config.
    ///
    /// Fails with [`io::ErrorKind::TimedOut`] if it does not complete within
    /// [`Config::connect_timeout`].
    pub async fn connect_with(config: Config) -> Result<Self> {
        #[cfg(feature = "tokio")]
        {
            match tokio::time::timeout(config.connect_timeout, Self::establish(&config)).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timeout").into()),
            }
        }

        #[cfg(not(feature = "tokio"))]
        {
            Self::establish(&config).await
        }
    }

    async fn establish(config: &Config) -> Result<Self> {
        let socket = match config.get_socket() {
            Some(path) => Socket::connect_socket(path).await?,
            None => Socket::connect_tcp(config.get_host(), config.get_port()).await?,
        };

        let mut me = Self {
            socket,
            read_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            write_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            seq: 0,
            discard: Discard::default(),
            connection_id: 0,
            server_version: ByteStr::default(),
            capabilities: 0,
            in_transaction: false,
            closed: false,
        };

        let res = startup::startup(&mut me, config).await?;

        #[cfg(feature = "log")]
        log::debug!("connected to mysql {} as connection {}", res.server_version, res.connection_id);

        me.connection_id = res.connection_id;
        me.server_version = res.server_version;
        me.capabilities = res.capabilities;
        Ok(me)
    }

    /// Server version string, e.g. `8.0.36`.
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Server assigned connection id.
    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    /// Capabilities agreed in handshake.
    pub fn capabilities(&self) -> u32 {
        self.capabilities
    }

    /// Returns `false` if connection is closed or broken.
    pub fn is_connected(&self) -> bool {
        !self.closed
    }

    /// Check that the server is alive.
    pub async fn ping(&mut self) -> Result<()> {
        if self.closed {
            return Err(ConnectionClosed.into());
        }
        self.send(frontend::Ping);
        self.flush().await?;
        self.recv_as::<OkPacket>().await?;
        Ok(())
    }

    /// Gracefully close the connection.
    ///
    /// Closing a closed connection is noop.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.send(frontend::Quit);
        let flushed = self.flush().await;
        self.closed = true;
        flushed?;
        std::future::poll_fn(|cx| self.socket.poll_shutdown(cx)).await?;
        Ok(())
    }

    fn poll_payload(&mut self, cx: &mut Context) -> Poll<Result<Bytes>> {
        loop {
            if let Some(payload) = take_payload(&mut self.read_buf, &mut self.seq) {
                return Poll::Ready(Ok(payload));
            }

            match ready!(self.socket.poll_read(&mut self.read_buf, cx)) {
                Ok(0) => {
                    self.closed = true;
                    return Poll::Ready(Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()));
                }
                Ok(_) => {}
                Err(err) => {
                    self.closed = true;
                    return Poll::Ready(Err(err.into()));
                }
            }
        }
    }

    fn write<F: FrontendProtocol>(&mut self, message: F) {
        frontend::write(message, &mut self.seq, &mut self.write_buf);
    }
}

/// Returns a complete, possibly joined, payload from `buf`.
///
/// `seq` is set to the sequence id following the last packet.
fn take_payload(buf: &mut BytesMut, seq: &mut u8) -> Option<Bytes> {
    const HEADER: usize = 4;

    let mut offset = 0;
    let mut frames = 0;

    loop {
        let Some(header) = buf.get(offset..offset + HEADER) else {
            buf.reserve(offset + HEADER - buf.len());
            return None;
        };
        let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
        let last_seq = header[3];

        if buf.len() < offset + HEADER + len {
            buf.reserve(offset + HEADER + len - buf.len());
            return None;
        }

        offset += HEADER + len;
        frames += 1;

        if len < MAX_PACKET_LEN {
            *seq = last_seq.wrapping_add(1);
            break;
        }
    }

    let mut packets = buf.split_to(offset);

    if frames == 1 {
        packets.advance(HEADER);
        return Some(packets.freeze());
    }

    verbose!(frames, "joining split payload");

    let mut payload = BytesMut::with_capacity(offset - HEADER * frames);
    while !packets.is_empty() {
        let len = u32::from_le_bytes([packets[0], packets[1], packets[2], 0]) as usize;
        packets.advance(HEADER);
        payload.put_slice(&packets[..len]);
        packets.advance(len);
    }
    Some(payload.freeze())
}

impl MyTransport for Connection {
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        if self.write_buf.is_empty() {
            return Poll::Ready(Ok(()));
        }
        let result = ready!(self.socket.poll_write_all(&mut self.write_buf, cx));
        if result.is_err() {
            self.closed = true;
        }
        Poll::Ready(result)
    }

    fn poll_recv(&mut self, cx: &mut Context) -> Poll<Result<Bytes>> {
        if !self.write_buf.is_empty() {
            ready!(self.poll_flush(cx))?;
        }

        loop {
            let payload = ready!(self.poll_payload(cx))?;

            let Some(payload) = self.discard.filter(payload) else {
                continue;
            };

            if payload.first() == Some(&header::ERR) {
                return Poll::Ready(Err(ServerError::decode(payload)?.into()));
            }

            return Poll::Ready(Ok(payload));
        }
    }

    fn send<F: FrontendProtocol>(&mut self, message: F) {
        self.seq = 0;
        self.write(message);
    }

    fn send_continue<F: FrontendProtocol>(&mut self, message: F) {
        self.write(message);
    }

    fn drain_request(&mut self) {
        self.discard.rows();
    }

    fn discard_response(&mut self) {
        self.discard.response();
    }

    fn connection_id(&self) -> u32 {
        self.connection_id
    }

    fn is_connected(&self) -> bool {
        !self.closed
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn set_transaction(&mut self, active: bool) {
        self.in_transaction = active;
    }
}

/// Authentication that cannot be performed.
pub enum UnsupportedAuth {
    /// Authentication plugin other than `mysql_native_password` and
    /// `caching_sha2_password`.
    Plugin(ByteStr),
    /// `caching_sha2_password` full authentication, which requires secure
    /// connection.
    FullAuthentication,
}

impl std::error::Error for UnsupportedAuth { }

impl fmt::Display for UnsupportedAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plugin(name) => write!(f, "authentication plugin {name:?}"),
            Self::FullAuthentication => f.write_str("caching_sha2_password full authentication without tls"),
        }
    }
}

impl fmt::Debug for UnsupportedAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
