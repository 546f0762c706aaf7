//! Socket stream of a connection.
//!
//! Requires the `tokio` feature, connecting panics otherwise.
use bytes::{Buf, BytesMut};
use std::{
    fmt, io,
    task::{Context, Poll},
};

/// Minimum spare capacity before reading from the socket.
const READ_CHUNK: usize = 4 * 1024;

/// Tcp or unix socket stream.
pub struct Socket {
    stream: Stream,
}

enum Stream {
    #[cfg(feature = "tokio")]
    Tcp(tokio::net::TcpStream),
    #[cfg(all(feature = "tokio", unix))]
    Unix(tokio::net::UnixStream),
}

/// Run `$body` with `$io` bound to the pinned inner stream.
#[cfg(feature = "tokio")]
macro_rules! with_stream {
    ($self:ident, $io:ident => $body:expr) => {
        match &mut $self.stream {
            Stream::Tcp(s) => {
                let $io = std::pin::Pin::new(s);
                $body
            }
            #[cfg(unix)]
            Stream::Unix(s) => {
                let $io = std::pin::Pin::new(s);
                $body
            }
        }
    };
}

impl Socket {
    /// Connect over tcp, with `TCP_NODELAY`.
    pub async fn connect_tcp(host: &str, port: u16) -> io::Result<Socket> {
        #[cfg(feature = "tokio")]
        {
            let tcp = tokio::net::TcpStream::connect((host, port)).await?;
            tcp.set_nodelay(true)?;
            Ok(Socket { stream: Stream::Tcp(tcp) })
        }

        #[cfg(not(feature = "tokio"))]
        {
            let _ = (host, port);
            panic!("connecting requires `tokio` feature")
        }
    }

    /// Connect to a unix socket path.
    pub async fn connect_socket(path: &str) -> io::Result<Socket> {
        #[cfg(all(feature = "tokio", unix))]
        {
            let unix = tokio::net::UnixStream::connect(path).await?;
            Ok(Socket { stream: Stream::Unix(unix) })
        }

        #[cfg(not(all(feature = "tokio", unix)))]
        {
            let _ = path;
            panic!("unix socket requires `tokio` feature on unix platform")
        }
    }

    /// Read available bytes to the end of `buf`.
    ///
    /// Returns `0` at end of stream.
    pub fn poll_read(&mut self, buf: &mut BytesMut, cx: &mut Context) -> Poll<io::Result<usize>> {
        #[cfg(feature = "tokio")]
        {
            use tokio::io::{AsyncRead, ReadBuf};

            if buf.capacity() - buf.len() < READ_CHUNK {
                buf.reserve(READ_CHUNK);
            }

            let mut read = ReadBuf::uninit(buf.spare_capacity_mut());
            std::task::ready!(with_stream!(self, io => io.poll_read(cx, &mut read)))?;
            let n = read.filled().len();

            // SAFETY: `ReadBuf::filled` is initialized by the read above
            unsafe { buf.set_len(buf.len() + n) };

            Poll::Ready(Ok(n))
        }

        #[cfg(not(feature = "tokio"))]
        {
            let _ = (buf, cx);
            unreachable!("socket cannot be constructed without `tokio` feature")
        }
    }

    /// Write the whole `buf` and flush, `buf` is advanced as it is written.
    pub fn poll_write_all(&mut self, buf: &mut BytesMut, cx: &mut Context) -> Poll<io::Result<()>> {
        #[cfg(feature = "tokio")]
        {
            use tokio::io::AsyncWrite;

            while buf.has_remaining() {
                let n = std::task::ready!(with_stream!(self, io => io.poll_write(cx, buf.chunk())))?;
                if n == 0 {
                    return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
                }
                buf.advance(n);
            }

            with_stream!(self, io => io.poll_flush(cx))
        }

        #[cfg(not(feature = "tokio"))]
        {
            let _ = (buf, cx);
            unreachable!("socket cannot be constructed without `tokio` feature")
        }
    }

    /// Shutdown the write half.
    pub fn poll_shutdown(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        #[cfg(feature = "tokio")]
        {
            use tokio::io::AsyncWrite;
            with_stream!(self, io => io.poll_shutdown(cx))
        }

        #[cfg(not(feature = "tokio"))]
        {
            let _ = cx;
            unreachable!("socket cannot be constructed without `tokio` feature")
        }
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.stream {
            #[cfg(feature = "tokio")]
            Stream::Tcp(tcp) => match tcp.peer_addr() {
                Ok(addr) => write!(f, "Socket({addr})"),
                Err(_) => f.write_str("Socket(tcp)"),
            },
            #[cfg(all(feature = "tokio", unix))]
            Stream::Unix(_) => f.write_str("Socket(unix)"),
            #[cfg(not(feature = "tokio"))]
            _ => { let _ = f; unreachable!() }
        }
    }
}

#[cfg(all(test, feature = "tokio"))]
mod test {
    use super::*;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    #[tokio::test]
    async fn read_and_write_all() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = vec![0; 10_000];
            stream.read_exact(&mut received).await.unwrap();
            stream.write_all(b"pong").await.unwrap();
            received
        });

        let mut socket = Socket::connect_tcp("127.0.0.1", port).await.unwrap();

        let mut out = BytesMut::from(&[7u8; 10_000][..]);
        std::future::poll_fn(|cx| socket.poll_write_all(&mut out, cx)).await.unwrap();
        assert!(out.is_empty());

        let mut buf = BytesMut::new();
        while buf.len() < 4 {
            let n = std::future::poll_fn(|cx| socket.poll_read(&mut buf, cx)).await.unwrap();
            assert_ne!(n, 0);
        }
        assert_eq!(&buf[..], b"pong");

        assert_eq!(server.await.unwrap(), vec![7; 10_000]);
    }
}
