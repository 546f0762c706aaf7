//! MySQL Client/Server Protocol
//!
//! ## Packets
//!
//! All communication is through a stream of packets. Each packet starts with
//! a 3 bytes little endian payload length and a 1 byte sequence id.
//!
//! ```text
//! ┏━━━━━━━━━━━━━━┳━━━━━┳━━━━━━━━━┓
//! ┃    Length    ┃ Seq ┃ Payload ┃
//! ┣━━━━━━━━━━━━━━╋━━━━━╋━━━━━━━━━┫
//! ┃  u24 (le)    ┃ u8  ┃  [u8]   ┃
//! ┣━━━━━━━━━━━━━━╋━━━━━╋━━━━━━━━━┫
//! ┃ 05 | 00 | 00 ┃ 00  ┃   ..    ┃
//! ┗━━━━━━━━━━━━━━┻━━━━━┻━━━━━━━━━┛
//! ```
//!
//! Payload of `0xFFFFFF` bytes or more is split into several packets, each
//! full packet is followed by the next one until a packet shorter than
//! `0xFFFFFF` is sent.
//!
//! The sequence id is reset to zero at the start of every command and
//! incremented on each packet in both direction.
//!
//! ## Binary Protocol
//!
//! Prepared statement ([`COM_STMT_PREPARE`][frontend::StmtPrepare]) transfer
//! parameters and rows in binary form, every value is written in its native
//! little endian representation, described by its [`WireType`].
//!
//! <https://dev.mysql.com/doc/dev/mysql-server/latest/PAGE_PROTOCOL.html>

mod wire_type;
mod error;

pub mod frontend;
pub mod backend;

pub use wire_type::{ColumnFlags, WireType};
pub use frontend::FrontendProtocol;
pub use backend::{BackendProtocol, OkPacket, EofPacket, ServerError};
pub use error::ProtocolError;

/// Maximum payload length of a single packet.
pub const MAX_PACKET_LEN: usize = 0xFF_FFFF;

/// The `binary` character set id, used by non text column.
pub const BINARY_CHARSET: u16 = 63;

/// Capability flags.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/latest/group__group__cs__capabilities__flags.html>
pub mod capability {
    pub const LONG_PASSWORD: u32 = 0x0000_0001;
    pub const FOUND_ROWS: u32 = 0x0000_0002;
    pub const LONG_FLAG: u32 = 0x0000_0004;
    pub const CONNECT_WITH_DB: u32 = 0x0000_0008;
    pub const PROTOCOL_41: u32 = 0x0000_0200;
    pub const TRANSACTIONS: u32 = 0x0000_2000;
    pub const SECURE_CONNECTION: u32 = 0x0000_8000;
    pub const MULTI_RESULTS: u32 = 0x0002_0000;
    pub const PS_MULTI_RESULTS: u32 = 0x0004_0000;
    pub const PLUGIN_AUTH: u32 = 0x0008_0000;
    pub const PLUGIN_AUTH_LENENC_CLIENT_DATA: u32 = 0x0020_0000;
    pub const DEPRECATE_EOF: u32 = 0x0100_0000;

    /// Capabilities always requested by the client.
    pub const CLIENT: u32 = LONG_PASSWORD
        | LONG_FLAG
        | PROTOCOL_41
        | TRANSACTIONS
        | SECURE_CONNECTION
        | MULTI_RESULTS
        | PS_MULTI_RESULTS
        | PLUGIN_AUTH
        | PLUGIN_AUTH_LENENC_CLIENT_DATA;
}

/// Server status flags, reported in `OK` and `EOF` packet.
pub mod status {
    pub const IN_TRANS: u16 = 0x0001;
    pub const AUTOCOMMIT: u16 = 0x0002;
    pub const MORE_RESULTS_EXISTS: u16 = 0x0008;
    pub const CURSOR_EXISTS: u16 = 0x0040;
    pub const LAST_ROW_SENT: u16 = 0x0080;
}

/// First payload byte of generic response packet.
pub mod header {
    pub const OK: u8 = 0x00;
    pub const LOCAL_INFILE: u8 = 0xFB;
    pub const EOF: u8 = 0xFE;
    pub const ERR: u8 = 0xFF;
}

/// Returns `true` if `payload` is an `EOF` packet.
///
/// A row or column count can also starts with `0xFE`, `EOF` packet is always
/// shorter than 9 bytes.
pub fn is_eof(payload: &[u8]) -> bool {
    payload.first() == Some(&header::EOF) && payload.len() < 9
}
