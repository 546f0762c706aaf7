use std::fmt;

use super::ProtocolError;

macro_rules! wire_types {
    ($($(#[$meta:meta])* $name:ident = $code:literal,)*) => {
        /// Column and parameter type code, `enum_field_types` in server source.
        ///
        /// <https://dev.mysql.com/doc/dev/mysql-server/latest/field__types_8h.html>
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum WireType {
            $($(#[$meta])* $name = $code,)*
        }

        impl WireType {
            /// Returns the type from its protocol code.
            pub fn from_code(code: u8) -> Result<Self, ProtocolError> {
                match code {
                    $($code => Ok(Self::$name),)*
                    _ => Err(ProtocolError::UnknownType(code)),
                }
            }

            /// Returns the type name as shown by the server.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$name => stringify!($name),)*
                }
            }
        }
    };
}

wire_types! {
    Decimal = 0x00,
    Tiny = 0x01,
    Short = 0x02,
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Null = 0x06,
    Timestamp = 0x07,
    LongLong = 0x08,
    Int24 = 0x09,
    Date = 0x0A,
    Time = 0x0B,
    DateTime = 0x0C,
    Year = 0x0D,
    NewDate = 0x0E,
    VarChar = 0x0F,
    Bit = 0x10,
    Json = 0xF5,
    NewDecimal = 0xF6,
    Enum = 0xF7,
    Set = 0xF8,
    TinyBlob = 0xF9,
    MediumBlob = 0xFA,
    LongBlob = 0xFB,
    Blob = 0xFC,
    VarString = 0xFD,
    String = 0xFE,
    Geometry = 0xFF,
}

impl WireType {
    /// Returns the protocol code.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Size of value in binary protocol, `None` for variable sized value.
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Tiny => Some(1),
            Self::Short | Self::Year => Some(2),
            Self::Long | Self::Int24 | Self::Float => Some(4),
            Self::LongLong | Self::Double => Some(8),
            Self::Null => Some(0),
            _ => None,
        }
    }

    /// Returns `true` for date, time, datetime and timestamp.
    pub const fn is_temporal(self) -> bool {
        matches!(
            self,
            Self::Date | Self::NewDate | Self::Time | Self::DateTime | Self::Timestamp
        )
    }

    /// Returns `true` for blob family.
    pub const fn is_blob(self) -> bool {
        matches!(
            self,
            Self::TinyBlob | Self::MediumBlob | Self::LongBlob | Self::Blob
        )
    }

    /// Returns `true` for integer family.
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Tiny | Self::Short | Self::Long | Self::Int24 | Self::LongLong | Self::Year
        )
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), self.code())
    }
}

/// Column definition flags.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnFlags(pub u16);

impl ColumnFlags {
    pub const NOT_NULL: u16 = 0x0001;
    pub const PRIMARY_KEY: u16 = 0x0002;
    pub const UNIQUE_KEY: u16 = 0x0004;
    pub const MULTIPLE_KEY: u16 = 0x0008;
    pub const BLOB: u16 = 0x0010;
    pub const UNSIGNED: u16 = 0x0020;
    pub const ZEROFILL: u16 = 0x0040;
    pub const BINARY: u16 = 0x0080;
    pub const ENUM: u16 = 0x0100;
    pub const AUTO_INCREMENT: u16 = 0x0200;
    pub const TIMESTAMP: u16 = 0x0400;
    pub const SET: u16 = 0x0800;

    /// Returns `true` if all bits of `flag` is set.
    pub const fn contains(self, flag: u16) -> bool {
        self.0 & flag == flag
    }

    pub const fn is_unsigned(self) -> bool {
        self.contains(Self::UNSIGNED)
    }

    pub const fn is_not_null(self) -> bool {
        self.contains(Self::NOT_NULL)
    }

    pub const fn is_primary_key(self) -> bool {
        self.contains(Self::PRIMARY_KEY)
    }

    pub const fn is_auto_increment(self) -> bool {
        self.contains(Self::AUTO_INCREMENT)
    }
}

impl fmt::Debug for ColumnFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ColumnFlags(0x{:04X})", self.0)
    }
}
