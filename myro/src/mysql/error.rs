//! Protocol error
use std::{fmt, str::Utf8Error};

use bytes::TryGetError;

/// An error when translating packet from mysql.
pub enum ProtocolError {
    /// Packet ends before the expected field.
    Truncated {
        requested: usize,
        available: usize,
    },
    /// Packet header not expected in current phase.
    Unexpected {
        found: u8,
        phase: &'static str,
    },
    /// Invalid length encoded integer prefix.
    InvalidLenenc(u8),
    /// String not nul terminated.
    MissingNul,
    /// Server send non utf8 metadata.
    Utf8(Utf8Error),
    /// Column type code not known.
    UnknownType(u8),
    /// Handshake protocol version other than 10.
    UnsupportedVersion(u8),
}

impl ProtocolError {
    pub(crate) fn unexpected(found: Option<&u8>, phase: &'static str) -> ProtocolError {
        Self::Unexpected {
            found: found.copied().unwrap_or_default(),
            phase,
        }
    }
}

impl From<TryGetError> for ProtocolError {
    fn from(value: TryGetError) -> Self {
        Self::Truncated {
            requested: value.requested,
            available: value.available,
        }
    }
}

impl From<Utf8Error> for ProtocolError {
    fn from(value: Utf8Error) -> Self {
        Self::Utf8(value)
    }
}

impl std::error::Error for ProtocolError { }

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { requested, available } => write!(
                f,
                "packet truncated, requested {requested} bytes, {available} available"
            ),
            Self::Unexpected { found, phase } => {
                write!(f, "unexpected packet header `0x{found:02X}` in `{phase}`")
            }
            Self::InvalidLenenc(prefix) => {
                write!(f, "invalid length encoded integer prefix `0x{prefix:02X}`")
            }
            Self::MissingNul => f.write_str("string is not nul terminated"),
            Self::Utf8(e) => write!(f, "non utf8 metadata: {e}"),
            Self::UnknownType(code) => write!(f, "unknown column type `0x{code:02X}`"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported protocol version {v}"),
        }
    }
}

impl fmt::Debug for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
