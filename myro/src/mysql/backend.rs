//! MySQL server packets.
//!
//! <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_basic_response_packets.html>
use bytes::{Buf, Bytes};
use std::fmt;

use super::{ProtocolError, capability, header, is_eof};
use crate::{
    common::ByteStr,
    ext::{BytesExt, FmtExt},
};

/// A type which can be decoded from mysql server packet payload.
pub trait BackendProtocol: Sized {
    /// Decode the payload, including the header byte.
    fn decode(payload: Bytes) -> Result<Self, ProtocolError>;
}

/// `OK_Packet`, signals successful completion of a command.
#[derive(Debug, Clone, Default)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status: u16,
    pub warnings: u16,
    /// Human readable status information.
    pub info: ByteStr,
}

impl BackendProtocol for OkPacket {
    fn decode(mut payload: Bytes) -> Result<Self, ProtocolError> {
        match payload.try_get_u8()? {
            header::OK => {}
            // `OK` packet in place of `EOF` have `0xFE` header
            header::EOF if payload.len() >= 8 => {}
            found => return Err(ProtocolError::unexpected(Some(&found), "OkPacket")),
        }
        let affected_rows = payload.get_lenenc_int()?;
        let last_insert_id = payload.get_lenenc_int()?;
        let status = payload.try_get_u16_le()?;
        let warnings = payload.try_get_u16_le()?;
        let info = ByteStr::from_utf8_lossy(payload);
        Ok(Self { affected_rows, last_insert_id, status, warnings, info })
    }
}

/// `EOF_Packet`, marks the end of column definitions and rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct EofPacket {
    pub warnings: u16,
    pub status: u16,
}

impl BackendProtocol for EofPacket {
    fn decode(mut payload: Bytes) -> Result<Self, ProtocolError> {
        if !is_eof(&payload) {
            return Err(ProtocolError::unexpected(payload.first(), "EofPacket"));
        }
        payload.advance(1);
        // pre 4.1 EOF carries no status
        if payload.len() < 4 {
            return Ok(Self::default());
        }
        Ok(Self {
            warnings: payload.try_get_u16_le()?,
            status: payload.try_get_u16_le()?,
        })
    }
}

/// `ERR_Packet`, signals that an error occurred.
///
/// <https://dev.mysql.com/doc/mysql-errors/8.0/en/server-error-reference.html>
#[derive(Clone)]
pub struct ServerError {
    code: u16,
    sql_state: ByteStr,
    message: ByteStr,
}

impl ServerError {
    /// Server error code, e.g. `1064` for syntax error.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Five characters SQLSTATE value.
    pub fn sql_state(&self) -> &str {
        &self.sql_state
    }

    /// Human readable error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl BackendProtocol for ServerError {
    fn decode(mut payload: Bytes) -> Result<Self, ProtocolError> {
        let found = payload.try_get_u8()?;
        if found != header::ERR {
            return Err(ProtocolError::unexpected(Some(&found), "ServerError"));
        }
        let code = payload.try_get_u16_le()?;
        let sql_state = match payload.first() {
            Some(b'#') => {
                payload.advance(1);
                ByteStr::from_utf8_lossy(payload.try_split_to(5)?)
            }
            _ => ByteStr::from_static("HY000"),
        };
        let message = ByteStr::from_utf8_lossy(payload);
        Ok(Self { code, sql_state, message })
    }
}

impl std::error::Error for ServerError { }

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ERROR {} ({}): {}", self.code, self.sql_state, self.message)
    }
}

impl fmt::Debug for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// `COM_STMT_PREPARE_OK`.
///
/// Followed by parameter definitions and column definitions, each block
/// terminated by `EOF` when non empty.
#[derive(Debug, Clone, Copy)]
pub struct PrepareOk {
    pub stmt_id: u32,
    pub columns: u16,
    pub params: u16,
    pub warnings: u16,
}

impl BackendProtocol for PrepareOk {
    fn decode(mut payload: Bytes) -> Result<Self, ProtocolError> {
        let found = payload.try_get_u8()?;
        if found != header::OK {
            return Err(ProtocolError::unexpected(Some(&found), "PrepareOk"));
        }
        let stmt_id = payload.try_get_u32_le()?;
        let columns = payload.try_get_u16_le()?;
        let params = payload.try_get_u16_le()?;
        // reserved filler
        let _ = payload.try_get_u8();
        let warnings = payload.try_get_u16_le().unwrap_or_default();
        Ok(Self { stmt_id, columns, params, warnings })
    }
}

/// `Protocol::HandshakeV10`, the initial packet sent by the server.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_connection_phase_packets_protocol_handshake_v10.html>
#[derive(Debug)]
pub struct Handshake {
    pub server_version: ByteStr,
    pub connection_id: u32,
    pub capabilities: u32,
    pub charset: u8,
    pub status: u16,
    /// Scramble used for authentication, without trailing nul.
    pub auth_data: Vec<u8>,
    pub auth_plugin: ByteStr,
}

impl BackendProtocol for Handshake {
    fn decode(mut payload: Bytes) -> Result<Self, ProtocolError> {
        let version = payload.try_get_u8()?;
        if version != 10 {
            return Err(ProtocolError::UnsupportedVersion(version));
        }
        let server_version = payload.get_nul_bytestr()?;
        let connection_id = payload.try_get_u32_le()?;

        let mut auth_data = payload.try_split_to(8)?.to_vec();
        // filler
        payload.try_get_u8()?;

        let mut capabilities = payload.try_get_u16_le()? as u32;
        let charset = payload.try_get_u8()?;
        let status = payload.try_get_u16_le()?;
        capabilities |= (payload.try_get_u16_le()? as u32) << 16;

        let auth_data_len = payload.try_get_u8()?;
        // reserved
        payload.try_split_to(10)?;

        if capabilities & capability::SECURE_CONNECTION != 0 {
            let len = (auth_data_len as usize).saturating_sub(8).max(13);
            let rest = payload.try_split_to(len)?;
            auth_data.extend_from_slice(&rest);
            if auth_data.last() == Some(&0) {
                auth_data.pop();
            }
        }

        let auth_plugin = if capabilities & capability::PLUGIN_AUTH != 0 && !payload.is_empty() {
            match payload.iter().position(|&b| b == 0) {
                Some(_) => payload.get_nul_bytestr()?,
                None => ByteStr::from_utf8(payload)?,
            }
        } else {
            ByteStr::from_static("mysql_native_password")
        };

        Ok(Self {
            server_version,
            connection_id,
            capabilities,
            charset,
            status,
            auth_data,
            auth_plugin,
        })
    }
}

/// Packet received in authentication phase.
#[derive(Debug)]
pub enum AuthMessage {
    /// Authentication succeed.
    Ok(OkPacket),
    /// `Protocol::AuthSwitchRequest`, server request a different plugin.
    Switch {
        plugin: ByteStr,
        data: Bytes,
    },
    /// `Protocol::AuthMoreData`, plugin specific data.
    MoreData(Bytes),
}

impl BackendProtocol for AuthMessage {
    fn decode(mut payload: Bytes) -> Result<Self, ProtocolError> {
        match payload.first().copied() {
            Some(header::OK) => OkPacket::decode(payload).map(Self::Ok),
            Some(header::EOF) => {
                payload.advance(1);
                let plugin = payload.get_nul_bytestr()?;
                if payload.last() == Some(&0) {
                    payload.truncate(payload.len() - 1);
                }
                Ok(Self::Switch { plugin, data: payload })
            }
            Some(0x01) => {
                payload.advance(1);
                Ok(Self::MoreData(payload))
            }
            found => Err(ProtocolError::unexpected(found.as_ref(), "Authentication")),
        }
    }
}

impl fmt::Display for AuthMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(_) => f.write_str("OK"),
            Self::Switch { plugin, .. } => write!(f, "AuthSwitchRequest({plugin})"),
            Self::MoreData(data) => write!(f, "AuthMoreData({})", data.lossy()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ok_packet() {
        let ok = OkPacket::decode(Bytes::from_static(b"\x00\x03\x2A\x02\x00\x01\x00Rows matched: 3")).unwrap();
        assert_eq!(ok.affected_rows, 3);
        assert_eq!(ok.last_insert_id, 42);
        assert_eq!(ok.status, 2);
        assert_eq!(ok.warnings, 1);
        assert_eq!(ok.info, "Rows matched: 3");
    }

    #[test]
    fn err_packet() {
        let err = ServerError::decode(Bytes::from_static(
            b"\xFF\x28\x04#42000You have an error in your SQL syntax",
        ))
        .unwrap();
        assert_eq!(err.code(), 1064);
        assert_eq!(err.sql_state(), "42000");
        assert_eq!(err.to_string(), "ERROR 1064 (42000): You have an error in your SQL syntax");
    }

    #[test]
    fn eof_packet() {
        let eof = EofPacket::decode(Bytes::from_static(b"\xFE\x00\x00\x08\x00")).unwrap();
        assert_eq!(eof.status, 8);
        assert!(EofPacket::decode(Bytes::from_static(b"\x00\x00")).is_err());
    }

    #[test]
    fn prepare_ok() {
        let ok = PrepareOk::decode(Bytes::from_static(b"\x00\x01\x00\x00\x00\x02\x00\x03\x00\x00\x00\x00")).unwrap();
        assert_eq!(ok.stmt_id, 1);
        assert_eq!(ok.columns, 2);
        assert_eq!(ok.params, 3);
    }

    #[test]
    fn handshake() {
        let mut payload = vec![10];
        payload.extend_from_slice(b"8.0.36\0");
        payload.extend_from_slice(&9u32.to_le_bytes());
        payload.extend_from_slice(b"abcdefgh\0");
        let caps = capability::CLIENT | capability::CONNECT_WITH_DB;
        payload.extend_from_slice(&(caps as u16).to_le_bytes());
        payload.push(45);
        payload.extend_from_slice(&2u16.to_le_bytes());
        payload.extend_from_slice(&((caps >> 16) as u16).to_le_bytes());
        payload.push(21);
        payload.extend_from_slice(&[0; 10]);
        payload.extend_from_slice(b"ijklmnopqrst\0");
        payload.extend_from_slice(b"caching_sha2_password\0");

        let hs = Handshake::decode(Bytes::from(payload)).unwrap();
        assert_eq!(hs.server_version, "8.0.36");
        assert_eq!(hs.connection_id, 9);
        assert_eq!(hs.auth_data, b"abcdefghijklmnopqrst");
        assert_eq!(hs.auth_plugin, "caching_sha2_password");
        assert_eq!(hs.capabilities, caps);
    }

    #[test]
    fn auth_switch() {
        let msg = AuthMessage::decode(Bytes::from_static(b"\xFEmysql_native_password\x00scramble\x00")).unwrap();
        let AuthMessage::Switch { plugin, data } = msg else {
            panic!("expected auth switch")
        };
        assert_eq!(plugin, "mysql_native_password");
        assert_eq!(&data[..], b"scramble");
    }
}
