//! MySQL client packets.
//!
//! <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_command_phase.html>
use bytes::{BufMut, BytesMut};

use super::{MAX_PACKET_LEN, capability};
use crate::{
    binding::Binding,
    ext::{BufMutExt, UsizeExt},
};

/// Write a client packet to `buf`, splitting it when payload is too large.
///
/// `seq` is the sequence id of the first packet, it is incremented for each
/// packet written.
pub fn write<F: FrontendProtocol>(msg: F, seq: &mut u8, buf: &mut BytesMut) {
    // length + sequence id
    const PREFIX: usize = 3 + 1;

    let size_hint = msg.size_hint();
    buf.reserve(PREFIX + size_hint);

    let offset = buf.len();
    buf.put_bytes(0, PREFIX);

    msg.encode(&mut *buf);

    let len = buf.len() - offset - PREFIX;
    assert_eq!(len, size_hint, "Client packet size not equal to size hint");

    if len < MAX_PACKET_LEN {
        buf[offset..offset + 3].copy_from_slice(&len.to_u32().to_le_bytes()[..3]);
        buf[offset + 3] = *seq;
        *seq = seq.wrapping_add(1);
        return;
    }

    let payload = buf.split_off(offset + PREFIX);
    buf.truncate(offset);
    buf.reserve(payload.len() + PREFIX * (payload.len() / MAX_PACKET_LEN + 1));

    for chunk in payload.chunks(MAX_PACKET_LEN) {
        buf.put_u24_le(chunk.len().to_u32());
        buf.put_u8(*seq);
        buf.put_slice(chunk);
        *seq = seq.wrapping_add(1);
    }

    // a payload of exact multiple of max length is terminated by empty packet
    if payload.len() % MAX_PACKET_LEN == 0 {
        buf.put_u24_le(0);
        buf.put_u8(*seq);
        *seq = seq.wrapping_add(1);
    }
}

/// A type which can be encoded into mysql client packet payload.
pub trait FrontendProtocol {
    /// Size of the payload.
    fn size_hint(&self) -> usize;

    /// Write the payload, including command byte if any.
    ///
    /// The length written must be equal to the length returned by
    /// [`size_hint`][FrontendProtocol::size_hint].
    fn encode(self, buf: impl BufMut);
}

/// Command byte.
pub mod command {
    pub const QUIT: u8 = 0x01;
    pub const QUERY: u8 = 0x03;
    pub const PING: u8 = 0x0E;
    pub const STMT_PREPARE: u8 = 0x16;
    pub const STMT_EXECUTE: u8 = 0x17;
    pub const STMT_CLOSE: u8 = 0x19;
    pub const STMT_RESET: u8 = 0x1A;
}

/// `COM_QUIT`, tells the server that the client wants it to close the connection.
///
/// Server may response with `ERR` or close the connection.
#[derive(Debug)]
pub struct Quit;

impl FrontendProtocol for Quit {
    fn size_hint(&self) -> usize {
        1
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u8(command::QUIT);
    }
}

/// `COM_PING`, check whether the server is alive.
///
/// Responses with `OK`.
#[derive(Debug)]
pub struct Ping;

impl FrontendProtocol for Ping {
    fn size_hint(&self) -> usize {
        1
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u8(command::PING);
    }
}

/// `COM_QUERY`, send a text protocol query.
///
/// Responses with `OK`, `ERR` or text result set.
#[derive(Debug)]
pub struct Query<'a> {
    pub sql: &'a str,
}

impl FrontendProtocol for Query<'_> {
    fn size_hint(&self) -> usize {
        1 + self.sql.len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u8(command::QUERY);
        buf.put(self.sql.as_bytes());
    }
}

/// `COM_STMT_PREPARE`, creates a prepared statement from the passed query string.
///
/// Responses with `COM_STMT_PREPARE_OK` or `ERR`.
#[derive(Debug)]
pub struct StmtPrepare<'a> {
    pub sql: &'a str,
}

impl FrontendProtocol for StmtPrepare<'_> {
    fn size_hint(&self) -> usize {
        1 + self.sql.len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u8(command::STMT_PREPARE);
        buf.put(self.sql.as_bytes());
    }
}

/// `COM_STMT_EXECUTE`, asks the server to execute a prepared statement.
///
/// ```text
/// u8   command
/// u32  statement id
/// u8   flags, 0 is CURSOR_TYPE_NO_CURSOR
/// u32  iteration count, always 1
/// if params > 0:
///   [u8]  null bitmap, (params + 7) / 8
///   u8    new params bound flag
///   [u16] parameter type and unsigned flag
///   [..]  non null values
/// ```
///
/// Responses with `OK`, `ERR` or binary result set.
#[derive(Debug)]
pub struct StmtExecute<'a> {
    pub stmt_id: u32,
    pub params: &'a [Binding],
}

impl StmtExecute<'_> {
    fn bitmap_len(&self) -> usize {
        self.params.len().div_ceil(8)
    }
}

impl FrontendProtocol for StmtExecute<'_> {
    fn size_hint(&self) -> usize {
        let header = 1 + 4 + 1 + 4;
        if self.params.is_empty() {
            return header;
        }
        let values = self
            .params
            .iter()
            .filter(|p| !p.is_null())
            .fold(0, |acc, p| acc + p.wire_len());
        header + self.bitmap_len() + 1 + self.params.len() * 2 + values
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u8(command::STMT_EXECUTE);
        buf.put_u32_le(self.stmt_id);
        buf.put_u8(0);
        buf.put_u32_le(1);

        if self.params.is_empty() {
            return;
        }

        let mut bitmap = vec![0u8; self.bitmap_len()];
        for (i, param) in self.params.iter().enumerate() {
            if param.is_null() {
                bitmap[i / 8] |= 1 << (i % 8);
            }
        }
        buf.put_slice(&bitmap);

        // new params bound, types are always sent
        buf.put_u8(1);

        for param in self.params {
            buf.put_u8(param.wire_type().code());
            buf.put_u8(if param.is_unsigned() { 0x80 } else { 0 });
        }

        for param in self.params.iter().filter(|p| !p.is_null()) {
            match param.wire_type().fixed_size() {
                Some(_) => buf.put_slice(param.as_slice()),
                None => buf.put_lenenc_bytes(param.as_slice()),
            }
        }
    }
}

/// `COM_STMT_CLOSE`, deallocates a prepared statement.
///
/// No response is sent back to the client.
#[derive(Debug)]
pub struct StmtClose {
    pub stmt_id: u32,
}

impl FrontendProtocol for StmtClose {
    fn size_hint(&self) -> usize {
        1 + 4
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u8(command::STMT_CLOSE);
        buf.put_u32_le(self.stmt_id);
    }
}

/// `Protocol::HandshakeResponse41`, reply to the initial handshake.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_connection_phase_packets_protocol_handshake_response.html>
#[derive(Debug)]
pub struct HandshakeResponse<'a> {
    pub capabilities: u32,
    pub max_packet_size: u32,
    pub charset: u8,
    pub user: &'a str,
    pub auth_response: &'a [u8],
    pub database: Option<&'a str>,
    pub auth_plugin: &'a str,
}

impl FrontendProtocol for HandshakeResponse<'_> {
    fn size_hint(&self) -> usize {
        let mut size = 4 + 4 + 1 + 23;
        size += self.user.len() + 1;
        size += self.auth_response.len().lenenc_len() + self.auth_response.len();
        if let Some(db) = self.database {
            size += db.len() + 1;
        }
        size + self.auth_plugin.len() + 1
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u32_le(self.capabilities);
        buf.put_u32_le(self.max_packet_size);
        buf.put_u8(self.charset);
        buf.put_bytes(0, 23);
        buf.put_nul_string(self.user);
        buf.put_lenenc_bytes(self.auth_response);
        if let Some(db) = self.database {
            debug_assert!(self.capabilities & capability::CONNECT_WITH_DB != 0);
            buf.put_nul_string(db);
        }
        buf.put_nul_string(self.auth_plugin);
    }
}

/// Raw authentication data, sent after auth switch or auth more data.
#[derive(Debug)]
pub struct AuthResponse<'a> {
    pub data: &'a [u8],
}

impl FrontendProtocol for AuthResponse<'_> {
    fn size_hint(&self) -> usize {
        self.data.len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_slice(self.data);
    }
}
