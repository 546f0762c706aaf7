//! Dynamically typed value.
use std::fmt;

use time::{Date, PrimitiveDateTime, Time};

/// A non null, dynamically typed, value.
///
/// `NULL` is represented by wrapping value in [`Option`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(Date),
    Time(Time),
    DateTime(PrimitiveDateTime),
    /// Value with no dedicated wire mapping, sent as text.
    ///
    /// Binding this variant logs a warning.
    Other(String),
}

impl Value {
    /// Wrap any [`Display`][fmt::Display] type in [`Value::Other`].
    pub fn other(value: impl fmt::Display) -> Self {
        Self::Other(value.to_string())
    }

    /// Returns value type name.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::I8(_) => "i8",
            Self::I16(_) => "i16",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::U8(_) => "u8",
            Self::U16(_) => "u16",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::DateTime(_) => "datetime",
            Self::Other(_) => "other",
        }
    }

    /// Returns the integer value widened to `i128`, if value is an integer.
    pub fn as_integer(&self) -> Option<i128> {
        Some(match *self {
            Self::Bool(v) => v as i128,
            Self::I8(v) => v as i128,
            Self::I16(v) => v as i128,
            Self::I32(v) => v as i128,
            Self::I64(v) => v as i128,
            Self::U8(v) => v as i128,
            Self::U16(v) => v as i128,
            Self::U32(v) => v as i128,
            Self::U64(v) => v as i128,
            _ => return None,
        })
    }

    /// Returns str for text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Other(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Display;

        match self {
            Self::Bool(v) => v.fmt(f),
            Self::I8(v) => v.fmt(f),
            Self::I16(v) => v.fmt(f),
            Self::I32(v) => v.fmt(f),
            Self::I64(v) => v.fmt(f),
            Self::U8(v) => v.fmt(f),
            Self::U16(v) => v.fmt(f),
            Self::U32(v) => v.fmt(f),
            Self::U64(v) => v.fmt(f),
            Self::F32(v) => v.fmt(f),
            Self::F64(v) => v.fmt(f),
            Self::Text(v) | Self::Other(v) => v.fmt(f),
            Self::Bytes(v) => {
                use crate::ext::FmtExt;
                v.lossy().fmt(f)
            }
            Self::Date(v) => v.fmt(f),
            Self::Time(v) => v.fmt(f),
            Self::DateTime(v) => v.fmt(f),
        }
    }
}

/// Declared kind of a target column.
///
/// Query builder uses this to tell how a temporal parameter should be
/// formatted. Unknown kind is [`ColumnKind::Other`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// `DATE`
    Date,
    /// `TIME`
    Time,
    /// `DATETIME` or `TIMESTAMP`
    Timestamp,
    #[default]
    Other,
}

macro_rules! from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

from! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => Text,
    Vec<u8> => Bytes,
    Date => Date,
    Time => Time,
    PrimitiveDateTime => DateTime,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<isize> for Value {
    fn from(value: isize) -> Self {
        Self::I64(value as i64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Self::U64(value as u64)
    }
}
