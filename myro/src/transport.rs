//! The [`MyTransport`] trait.
use bytes::Bytes;
use std::{
    collections::VecDeque,
    io,
    task::{Context, Poll},
};

use crate::{
    Result,
    common::verbose,
    mysql::{BackendProtocol, EofPacket, FrontendProtocol, OkPacket, ServerError, header, is_eof, status},
};

/// A buffered stream which can send and receive mysql packets.
pub trait MyTransport: Unpin {
    /// Poll to flush the underlying io.
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<io::Result<()>>;

    /// Poll to receive a packet payload.
    ///
    /// Calling `poll_recv` will also try to [`poll_flush`][1] if there is buffered packet.
    ///
    /// Payload split into multiple packets is returned joined.
    ///
    /// Implementor should handle `ERR` packet and return it as [`Err`].
    ///
    /// Implementor also should skip packets requested to be discarded by
    /// [`drain_request`][2] and [`discard_response`][3].
    ///
    /// [1]: MyTransport::poll_flush
    /// [2]: MyTransport::drain_request
    /// [3]: MyTransport::discard_response
    fn poll_recv(&mut self, cx: &mut Context) -> Poll<Result<Bytes>>;

    /// Send a command packet, starting a new sequence.
    ///
    /// Note that this send is buffered, caller must also call
    /// [`poll_flush`][1] or [`flush`][2] afterwards.
    ///
    /// [1]: MyTransport::poll_flush
    /// [2]: MyTransportExt::flush
    fn send<F: FrontendProtocol>(&mut self, message: F);

    /// Send a packet continuing the current sequence.
    ///
    /// Used in connection phase, where the client reply to server packet.
    fn send_continue<F: FrontendProtocol>(&mut self, message: F);

    /// Request implementor to ignore the remaining rows of the result set
    /// currently being read, until its terminating `EOF` or `ERR`.
    fn drain_request(&mut self);

    /// Request implementor to ignore the whole response of a command which
    /// is sent without waiting its response.
    fn discard_response(&mut self);

    /// Server assigned id of the underlying connection.
    fn connection_id(&self) -> u32;

    /// Returns `false` if connection is closed or broken.
    fn is_connected(&self) -> bool;

    /// Returns `true` if a transaction is started by this driver.
    fn in_transaction(&self) -> bool;

    /// Record transaction state.
    fn set_transaction(&mut self, active: bool);
}

impl<P> MyTransport for &mut P where P: MyTransport {
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        P::poll_flush(self, cx)
    }

    fn poll_recv(&mut self, cx: &mut Context) -> Poll<Result<Bytes>> {
        P::poll_recv(self, cx)
    }

    fn send<F: FrontendProtocol>(&mut self, message: F) {
        P::send(self, message);
    }

    fn send_continue<F: FrontendProtocol>(&mut self, message: F) {
        P::send_continue(self, message);
    }

    fn drain_request(&mut self) {
        P::drain_request(self);
    }

    fn discard_response(&mut self) {
        P::discard_response(self);
    }

    fn connection_id(&self) -> u32 {
        P::connection_id(self)
    }

    fn is_connected(&self) -> bool {
        P::is_connected(self)
    }

    fn in_transaction(&self) -> bool {
        P::in_transaction(self)
    }

    fn set_transaction(&mut self, active: bool) {
        P::set_transaction(self, active);
    }
}

/// An extension trait to provide `Future` API for [`MyTransport`].
pub trait MyTransportExt: MyTransport {
    /// Flush the underlying io.
    fn flush(&mut self) -> impl Future<Output = io::Result<()>> {
        std::future::poll_fn(|cx|self.poll_flush(cx))
    }

    /// Receive a packet payload.
    fn recv(&mut self) -> impl Future<Output = Result<Bytes>> {
        std::future::poll_fn(|cx|self.poll_recv(cx))
    }

    /// Receive and decode a packet.
    fn recv_as<B: BackendProtocol>(&mut self) -> impl Future<Output = Result<B>> {
        async { Ok(B::decode(self.recv().await?)?) }
    }
}

impl<T> MyTransportExt for T where T: MyTransport { }

/// Packets the client is not going to read.
#[derive(Debug, Default)]
pub(crate) struct Discard {
    queue: VecDeque<Pending>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    /// A whole response, `OK`, `ERR` or a result set.
    Response,
    /// Column definitions of a result set, until `EOF`.
    Columns,
    /// Rows of a result set, until `EOF` or `ERR`.
    Rows,
}

impl Discard {
    pub(crate) fn rows(&mut self) {
        self.queue.push_back(Pending::Rows);
    }

    pub(crate) fn response(&mut self) {
        self.queue.push_back(Pending::Response);
    }

    /// Returns the payload back if it is not discarded.
    pub(crate) fn filter(&mut self, payload: Bytes) -> Option<Bytes> {
        let Some(front) = self.queue.front_mut() else {
            return Some(payload);
        };

        let first = payload.first().copied();
        let more_results = match (*front, first) {
            (Pending::Response, Some(header::OK)) => {
                OkPacket::decode(payload).is_ok_and(|ok| ok.status & status::MORE_RESULTS_EXISTS != 0)
            }
            (Pending::Response, Some(header::ERR)) => {
                Self::log_error(payload);
                false
            }
            (Pending::Response, _) => {
                *front = Pending::Columns;
                return None;
            }
            (Pending::Columns, _) => {
                if is_eof(&payload) {
                    *front = Pending::Rows;
                }
                return None;
            }
            (Pending::Rows, _) if is_eof(&payload) => {
                EofPacket::decode(payload).is_ok_and(|eof| eof.status & status::MORE_RESULTS_EXISTS != 0)
            }
            (Pending::Rows, Some(header::ERR)) => {
                Self::log_error(payload);
                false
            }
            (Pending::Rows, _) => return None,
        };

        verbose!("discarded response complete, more results: {more_results}");

        match more_results {
            true => *front = Pending::Response,
            false => {
                self.queue.pop_front();
            }
        }

        None
    }

    fn log_error(payload: Bytes) {
        let _err = ServerError::decode(payload);
        #[cfg(feature = "log")]
        if let Ok(err) = _err {
            log::error!("discarded response failed: {err}");
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In memory transport, replaying scripted server packets.
    use bytes::{BufMut, Bytes, BytesMut};
    use std::{
        collections::VecDeque,
        io,
        task::{Context, Poll},
    };

    use super::{Discard, MyTransport};
    use crate::{
        Result,
        ext::BufMutExt,
        mysql::{BINARY_CHARSET, BackendProtocol, FrontendProtocol, ServerError, WireType, frontend, header},
    };

    /// Scripted server.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        inbox: VecDeque<Bytes>,
        discard: Discard,
        /// Payloads sent by the client, in order.
        pub sent: Vec<Bytes>,
        /// Sent but not flushed.
        buffered: Vec<Bytes>,
        pub flushes: usize,
        pub closed: bool,
        pub connection_id: u32,
        pub in_transaction: bool,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self { connection_id: 1, ..Default::default() }
        }

        /// Queue a raw server payload.
        pub fn push(&mut self, payload: impl Into<Bytes>) -> &mut Self {
            self.inbox.push_back(payload.into());
            self
        }

        pub fn push_ok(&mut self, affected_rows: u64, last_insert_id: u64) -> &mut Self {
            self.push_ok_status(affected_rows, last_insert_id, 0)
        }

        pub fn push_ok_status(&mut self, affected_rows: u64, last_insert_id: u64, status: u16) -> &mut Self {
            let mut buf = BytesMut::new();
            buf.put_u8(header::OK);
            buf.put_lenenc_int(affected_rows);
            buf.put_lenenc_int(last_insert_id);
            buf.put_u16_le(status);
            buf.put_u16_le(0);
            self.push(buf.freeze())
        }

        pub fn push_eof(&mut self) -> &mut Self {
            self.push_eof_status(0)
        }

        pub fn push_eof_status(&mut self, status: u16) -> &mut Self {
            let mut buf = BytesMut::new();
            buf.put_u8(header::EOF);
            buf.put_u16_le(0);
            buf.put_u16_le(status);
            self.push(buf.freeze())
        }

        pub fn push_err(&mut self, code: u16, sql_state: &str, message: &str) -> &mut Self {
            let mut buf = BytesMut::new();
            buf.put_u8(header::ERR);
            buf.put_u16_le(code);
            buf.put_u8(b'#');
            buf.put_slice(sql_state.as_bytes());
            buf.put_slice(message.as_bytes());
            self.push(buf.freeze())
        }

        /// `COM_STMT_PREPARE_OK` followed by parameter and column definitions.
        pub fn push_prepare_ok(&mut self, stmt_id: u32, params: u16, columns: &[(&str, WireType, u16)]) -> &mut Self {
            let mut buf = BytesMut::new();
            buf.put_u8(header::OK);
            buf.put_u32_le(stmt_id);
            buf.put_u16_le(columns.len() as u16);
            buf.put_u16_le(params);
            buf.put_u8(0);
            buf.put_u16_le(0);
            self.push(buf.freeze());

            if params > 0 {
                for _ in 0..params {
                    self.push_column("?", WireType::VarString, 0);
                }
                self.push_eof();
            }
            if !columns.is_empty() {
                self.push_columns(columns, false);
            }
            self
        }

        /// Column definition packet.
        pub fn push_column(&mut self, name: &str, wire_type: WireType, flags: u16) -> &mut Self {
            let (charset, length) = match wire_type {
                WireType::VarString | WireType::String | WireType::VarChar => (45, 1020),
                WireType::Blob if flags & crate::mysql::ColumnFlags::BINARY == 0 => (45, 65535),
                WireType::Blob => (BINARY_CHARSET, 65535),
                WireType::Tiny if name.starts_with("is_") => (BINARY_CHARSET, 1),
                _ => (BINARY_CHARSET, 20),
            };
            let mut buf = BytesMut::new();
            buf.put_lenenc_bytes(b"def");
            buf.put_lenenc_bytes(b"test");
            buf.put_lenenc_bytes(b"t");
            buf.put_lenenc_bytes(b"t");
            buf.put_lenenc_bytes(name.as_bytes());
            buf.put_lenenc_bytes(name.as_bytes());
            buf.put_u8(0x0C);
            buf.put_u16_le(charset);
            buf.put_u32_le(length);
            buf.put_u8(wire_type.code());
            buf.put_u16_le(flags);
            buf.put_u8(0);
            buf.put_u16_le(0);
            self.push(buf.freeze())
        }

        /// Column definitions followed by `EOF`, with column count first if
        /// `with_count` is set.
        pub fn push_columns(&mut self, columns: &[(&str, WireType, u16)], with_count: bool) -> &mut Self {
            if with_count {
                let mut buf = BytesMut::new();
                buf.put_lenenc_int(columns.len() as u64);
                self.push(buf.freeze());
            }
            for (name, wire_type, flags) in columns {
                self.push_column(name, *wire_type, *flags);
            }
            self.push_eof()
        }

        /// Binary row, values are already encoded, `None` is `NULL`.
        pub fn push_row(&mut self, values: &[Option<&[u8]>], wire_types: &[WireType]) -> &mut Self {
            let mut buf = BytesMut::new();
            buf.put_u8(header::OK);
            let mut bitmap = vec![0u8; (values.len() + 7 + 2) / 8];
            for (i, value) in values.iter().enumerate() {
                if value.is_none() {
                    let bit = i + 2;
                    bitmap[bit / 8] |= 1 << (bit % 8);
                }
            }
            buf.put_slice(&bitmap);
            for (value, wire_type) in values.iter().zip(wire_types) {
                let Some(value) = value else { continue };
                match wire_type.fixed_size() {
                    Some(_) => buf.put_slice(value),
                    None if wire_type.is_temporal() => {
                        buf.put_u8(value.len() as u8);
                        buf.put_slice(value);
                    }
                    None => buf.put_lenenc_bytes(value),
                }
            }
            self.push(buf.freeze())
        }

        /// Command bytes of all sent payloads.
        pub fn commands(&self) -> Vec<u8> {
            self.sent.iter().chain(&self.buffered).map(|p| p[0]).collect()
        }

        /// Number of packets not yet consumed.
        pub fn remaining(&self) -> usize {
            self.inbox.len()
        }

        fn write<F: FrontendProtocol>(&mut self, message: F) {
            let mut buf = BytesMut::new();
            frontend::write(message, &mut 0, &mut buf);
            self.buffered.push(buf.freeze().slice(4..));
        }
    }

    impl MyTransport for MockTransport {
        fn poll_flush(&mut self, _: &mut Context) -> Poll<io::Result<()>> {
            self.flushes += 1;
            self.sent.append(&mut self.buffered);
            Poll::Ready(Ok(()))
        }

        fn poll_recv(&mut self, cx: &mut Context) -> Poll<Result<Bytes>> {
            if !self.buffered.is_empty() {
                let _ = self.poll_flush(cx);
            }
            loop {
                let Some(payload) = self.inbox.pop_front() else {
                    return Poll::Ready(Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()));
                };
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
}

#[cfg(test)]
mod test {
    use super::{MyTransportExt, mock::MockTransport, *};
    use crate::{ErrorKind, mysql::WireType};

    #[tokio::test]
    async fn drain_skips_rows_and_following_result() {
        let mut io = MockTransport::new();
        io.push_row(&[Some(b"a".as_slice())], &[WireType::VarString])
            .push_row(&[None], &[WireType::VarString])
            .push_eof()
            // response of a discarded command, with a result set
            .push_columns(&[("n", WireType::LongLong, 0)], true)
            .push_row(&[Some(&1i64.to_le_bytes()[..])], &[WireType::LongLong])
            .push_eof()
            .push_ok(1, 0);

        io.drain_request();
        io.discard_response();

        let ok = io.recv_as::<OkPacket>().await.unwrap();
        assert_eq!(ok.affected_rows, 1);
        assert_eq!(io.remaining(), 0);
    }

    #[tokio::test]
    async fn discarded_error_is_swallowed() {
        let mut io = MockTransport::new();
        io.push_err(1213, "40001", "Deadlock found").push_ok(0, 0);
        io.discard_response();
        assert!(io.recv().await.is_ok());
    }

    #[tokio::test]
    async fn err_packet_is_error() {
        let mut io = MockTransport::new();
        io.push_err(1146, "42S02", "Table 'test.nope' doesn't exist");
        let err = io.recv().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Database(e) if e.code() == 1146));
    }

    #[tokio::test]
    async fn more_results_are_discarded() {
        let mut io = MockTransport::new();
        io.push_ok_status(0, 0, status::MORE_RESULTS_EXISTS).push_ok(0, 0).push_ok(5, 0);
        io.discard_response();
        let ok = io.recv_as::<OkPacket>().await.unwrap();
        assert_eq!(ok.affected_rows, 5);
    }
}
