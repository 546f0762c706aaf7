//! Extension traits over `bytes` types for the mysql wire format.
//!
//! Integer in mysql protocol are little endian. Variable sized value use
//! "length encoded integer" prefix:
//!
//! | first byte  | value                           |
//! |-------------|---------------------------------|
//! | `< 0xFB`    | the byte itself                 |
//! | `0xFC`      | next 2 bytes                    |
//! | `0xFD`      | next 3 bytes                    |
//! | `0xFE`      | next 8 bytes                    |
//!
//! `0xFB` is `NULL` in text protocol and `0xFF` is never a valid prefix.
use bytes::{Buf, BufMut, Bytes};

use crate::{common::ByteStr, mysql::ProtocolError};

/// Integer conversion for protocol length fields.
pub trait UsizeExt {
    /// Length is `usize` in rust, while the protocol want `u32`,
    /// this will panic when overflow instead of wrapping.
    fn to_u32(self) -> u32;
    /// Number of bytes required to write self as length encoded integer.
    fn lenenc_len(self) -> usize;
}

/// Length encoded operation in [`BufMut`].
pub trait BufMutExt {
    /// Write string and nul termination.
    fn put_nul_string(&mut self, string: &str);

    /// Write length encoded integer.
    fn put_lenenc_int(&mut self, value: u64);

    /// Write length encoded integer prefix followed by the bytes.
    fn put_lenenc_bytes(&mut self, bytes: &[u8]);

    /// Write 3 bytes little endian integer.
    fn put_u24_le(&mut self, value: u32);
}

/// Checked read operation in [`Bytes`].
///
/// All operation returns [`ProtocolError`] instead of panic when the packet
/// is shorter than expected.
pub trait BytesExt {
    /// Try to read nul terminated string.
    fn get_nul_bytestr(&mut self) -> Result<ByteStr, ProtocolError>;

    /// Try to read length encoded integer.
    fn get_lenenc_int(&mut self) -> Result<u64, ProtocolError>;

    /// Try to read length encoded bytes.
    fn get_lenenc_bytes(&mut self) -> Result<Bytes, ProtocolError>;

    /// Try to read length encoded string.
    fn get_lenenc_bytestr(&mut self) -> Result<ByteStr, ProtocolError>;

    /// Try to split exactly `len` bytes.
    fn try_split_to(&mut self, len: usize) -> Result<Bytes, ProtocolError>;
}

/// Helper trait to [`Display`][std::fmt::Display] bytes.
pub trait FmtExt {
    /// Lossy [`Display`][std::fmt::Display] bytes.
    fn lossy(&self) -> LossyFmt<'_>;
}

/// Lossy [`Display`][std::fmt::Display] implementation for bytes.
pub struct LossyFmt<'a>(pub &'a [u8]);

impl UsizeExt for usize {
    fn to_u32(self) -> u32 {
        self.try_into().expect("packet size too large for protocol")
    }

    fn lenenc_len(self) -> usize {
        match self {
            0..0xFB => 1,
            0xFB..0x1_0000 => 3,
            0x1_0000..0x100_0000 => 4,
            _ => 9,
        }
    }
}

impl<B: BufMut> BufMutExt for B {
    fn put_nul_string(&mut self, string: &str) {
        self.put(string.as_bytes());
        self.put_u8(b'\0');
    }

    fn put_lenenc_int(&mut self, value: u64) {
        match value {
            0..0xFB => self.put_u8(value as u8),
            0xFB..0x1_0000 => {
                self.put_u8(0xFC);
                self.put_u16_le(value as u16);
            }
            0x1_0000..0x100_0000 => {
                self.put_u8(0xFD);
                self.put_u24_le(value as u32);
            }
            _ => {
                self.put_u8(0xFE);
                self.put_u64_le(value);
            }
        }
    }

    fn put_lenenc_bytes(&mut self, bytes: &[u8]) {
        self.put_lenenc_int(bytes.len() as u64);
        self.put(bytes);
    }

    fn put_u24_le(&mut self, value: u32) {
        self.put(&value.to_le_bytes()[..3]);
    }
}

impl BytesExt for Bytes {
    fn get_nul_bytestr(&mut self) -> Result<ByteStr, ProtocolError> {
        let end = self
            .iter()
            .position(|e| matches!(e, b'\0'))
            .ok_or(ProtocolError::MissingNul)?;
        let me = self.split_to(end);
        Buf::advance(self, 1); // nul
        Ok(ByteStr::from_utf8(me)?)
    }

    fn get_lenenc_int(&mut self) -> Result<u64, ProtocolError> {
        Ok(match self.try_get_u8()? {
            n @ 0..0xFB => n as u64,
            0xFC => self.try_get_u16_le()? as u64,
            0xFD => self.try_get_uint_le(3)?,
            0xFE => self.try_get_u64_le()?,
            prefix => return Err(ProtocolError::InvalidLenenc(prefix)),
        })
    }

    fn get_lenenc_bytes(&mut self) -> Result<Bytes, ProtocolError> {
        let len = self.get_lenenc_int()?;
        self.try_split_to(len as usize)
    }

    fn get_lenenc_bytestr(&mut self) -> Result<ByteStr, ProtocolError> {
        Ok(ByteStr::from_utf8(self.get_lenenc_bytes()?)?)
    }

    fn try_split_to(&mut self, len: usize) -> Result<Bytes, ProtocolError> {
        if self.len() < len {
            return Err(ProtocolError::Truncated { requested: len, available: self.len() });
        }
        Ok(self.split_to(len))
    }
}

impl FmtExt for [u8] {
    fn lossy(&self) -> LossyFmt<'_> {
        LossyFmt(self)
    }
}

impl std::fmt::Display for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b\"{self}\"")
    }
}
