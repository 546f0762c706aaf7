//! Mapping between [`Value`] and the binary protocol representation.
//!
//! | rust / [`Value`]             | wire type    |
//! |------------------------------|--------------|
//! | `bool`, `i8`, `u8`           | `TINY`       |
//! | `i16`, `u16`                 | `SHORT`      |
//! | `i32`, `u32`                 | `LONG`       |
//! | `i64`, `u64`                 | `LONGLONG`   |
//! | `f32`                        | `FLOAT`      |
//! | `f64`                        | `DOUBLE`     |
//! | `String`, [`Value::Other`]   | `STRING`     |
//! | `Vec<u8>`                    | `BLOB`       |
//! | date, time, datetime         | `STRING`     |
//!
//! Decoding follows the column description:
//!
//! - `TINYINT(1)` decodes as `bool`
//! - `DECIMAL` decodes as text, exact
//! - string and blob family decodes as bytes when the column charset is
//!   `binary`, as text otherwise
//! - zero dates and `TIME` outside a single day decode as text
//!
//! Integration with external types:
//!
//! - [`time`][::time]'s [`Date`][::time::Date], [`Time`][::time::Time] and
//!   [`PrimitiveDateTime`][::time::PrimitiveDateTime]
//! - [`serde`]'s `Deserialize` and `Serialize` via `Json`, requires `json` feature
use bytes::Bytes;

use crate::{
    describe::ColumnDescriptor,
    ext::BytesExt,
    mysql::{ProtocolError, WireType},
    row::DecodeError,
    value::{ColumnKind, Value},
};

mod time;

#[cfg(feature = "json")]
mod json;
#[cfg(feature = "json")]
pub use json::Json;

/// Initial allocation ceiling of a variable sized output buffer.
pub const OUTPUT_BUFFER_CEILING: usize = 64 * 1024;

/// Returns the wire type and unsigned flag used to send `value`.
pub fn wire_type_of(value: &Value) -> (WireType, bool) {
    match value {
        Value::Bool(_) | Value::I8(_) => (WireType::Tiny, false),
        Value::U8(_) => (WireType::Tiny, true),
        Value::I16(_) => (WireType::Short, false),
        Value::U16(_) => (WireType::Short, true),
        Value::I32(_) => (WireType::Long, false),
        Value::U32(_) => (WireType::Long, true),
        Value::I64(_) => (WireType::LongLong, false),
        Value::U64(_) => (WireType::LongLong, true),
        Value::F32(_) => (WireType::Float, false),
        Value::F64(_) => (WireType::Double, false),
        Value::Bytes(_) => (WireType::Blob, false),
        Value::Text(_)
        | Value::Other(_)
        | Value::Date(_)
        | Value::Time(_)
        | Value::DateTime(_) => (WireType::String, false),
    }
}

/// Number of bytes [`encode`] writes for `value`.
pub fn encoded_len(value: &Value, kind: ColumnKind) -> usize {
    match value {
        Value::Bool(_) | Value::I8(_) | Value::U8(_) => 1,
        Value::I16(_) | Value::U16(_) => 2,
        Value::I32(_) | Value::U32(_) | Value::F32(_) => 4,
        Value::I64(_) | Value::U64(_) | Value::F64(_) => 8,
        Value::Text(s) | Value::Other(s) => s.len(),
        Value::Bytes(b) => b.len(),
        Value::Date(_) | Value::Time(_) | Value::DateTime(_) => time::formatted_len(value, kind),
    }
}

/// Write the binary representation of `value`, without length prefix.
///
/// Temporal values are written as text, a datetime is narrowed to the
/// declared `kind` of the target column.
pub fn encode(value: &Value, kind: ColumnKind, buf: &mut Vec<u8>) {
    match value {
        Value::Bool(v) => buf.push(*v as u8),
        Value::I8(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::U8(v) => buf.push(*v),
        Value::I16(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::U16(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::I32(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::U32(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::I64(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::U64(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::F32(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::F64(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::Text(s) => buf.extend_from_slice(s.as_bytes()),
        Value::Other(s) => {
            #[cfg(feature = "log")]
            log::warn!("binding value without dedicated wire type as text: {s:?}");
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Bytes(b) => buf.extend_from_slice(b),
        Value::Date(_) | Value::Time(_) | Value::DateTime(_) => time::format_into(value, kind, buf),
    }
}

/// Returns the initial output buffer size for `column`.
///
/// Fixed width and temporal type get their exact size, variable sized type
/// get the declared length capped at [`OUTPUT_BUFFER_CEILING`].
pub fn size_of(column: &ColumnDescriptor) -> usize {
    let wire_type = column.wire_type();
    if let Some(size) = wire_type.fixed_size() {
        return size;
    }
    match wire_type {
        WireType::Time => time::TIME_LEN,
        WireType::Date | WireType::NewDate | WireType::DateTime | WireType::Timestamp => time::DATETIME_LEN,
        _ => (column.length() as usize).min(OUTPUT_BUFFER_CEILING),
    }
}

/// Split one non null value of `wire_type` from a binary row.
pub(crate) fn split_value(wire_type: WireType, row: &mut Bytes) -> Result<Bytes, ProtocolError> {
    if let Some(size) = wire_type.fixed_size() {
        return row.try_split_to(size);
    }
    if wire_type.is_temporal() {
        let len = *row.first().ok_or(ProtocolError::Truncated { requested: 1, available: 0 })?;
        let mut value = row.try_split_to(1 + len as usize)?;
        let _ = value.split_to(1);
        return Ok(value);
    }
    row.get_lenenc_bytes()
}

/// Decode a non null value of `column` from its binary representation.
pub fn decode(raw: &[u8], column: &ColumnDescriptor) -> Result<Value, DecodeError> {
    let wire_type = column.wire_type();
    let unsigned = column.is_unsigned();

    macro_rules! int {
        ($signed:ident $unsigned:ident) => {{
            let bytes = raw
                .get(..std::mem::size_of::<$signed>())
                .ok_or(DecodeError::Malformed(wire_type))?
                .try_into()
                .map_err(|_| DecodeError::Malformed(wire_type))?;
            match unsigned {
                true => Value::from($unsigned::from_le_bytes(bytes)),
                false => Value::from($signed::from_le_bytes(bytes)),
            }
        }};
    }

    Ok(match wire_type {
        WireType::Tiny if column.is_boolean() => {
            Value::Bool(*raw.first().ok_or(DecodeError::Malformed(wire_type))? != 0)
        }
        WireType::Tiny => int!(i8 u8),
        WireType::Short | WireType::Year => int!(i16 u16),
        WireType::Long | WireType::Int24 => int!(i32 u32),
        WireType::LongLong => int!(i64 u64),
        WireType::Float => {
            let bytes = raw.try_into().map_err(|_| DecodeError::Malformed(wire_type))?;
            Value::F32(f32::from_le_bytes(bytes))
        }
        WireType::Double => {
            let bytes = raw.try_into().map_err(|_| DecodeError::Malformed(wire_type))?;
            Value::F64(f64::from_le_bytes(bytes))
        }
        WireType::Date | WireType::NewDate => time::decode_date(raw, false)?,
        WireType::DateTime | WireType::Timestamp => time::decode_date(raw, true)?,
        WireType::Time => time::decode_time(raw)?,
        WireType::Decimal | WireType::NewDecimal | WireType::Json | WireType::Enum | WireType::Set => {
            Value::Text(std::str::from_utf8(raw)?.to_owned())
        }
        WireType::Bit | WireType::Geometry => Value::Bytes(raw.to_vec()),
        WireType::VarChar
        | WireType::VarString
        | WireType::String
        | WireType::TinyBlob
        | WireType::MediumBlob
        | WireType::LongBlob
        | WireType::Blob => match column.is_binary() {
            true => Value::Bytes(raw.to_vec()),
            false => Value::Text(std::str::from_utf8(raw)?.to_owned()),
        },
        WireType::Null => return Err(DecodeError::Malformed(wire_type)),
    })
}

#[cfg(test)]
mod test {
    use ::time::macros::{date, datetime, time};

    use super::*;
    use crate::mysql::{BINARY_CHARSET, ColumnFlags};

    fn column(wire_type: WireType, flags: u16, charset: u16, length: u32) -> ColumnDescriptor {
        ColumnDescriptor::new("c", wire_type, ColumnFlags(flags), charset, length)
    }

    fn round_trip(value: Value, column: &ColumnDescriptor) -> Value {
        let mut buf = Vec::new();
        encode(&value, ColumnKind::Other, &mut buf);
        assert_eq!(buf.len(), encoded_len(&value, ColumnKind::Other));
        decode(&buf, column).unwrap()
    }

    #[test]
    fn integer_widths() {
        assert_eq!(wire_type_of(&Value::U8(1)), (WireType::Tiny, true));
        assert_eq!(wire_type_of(&Value::I16(1)), (WireType::Short, false));
        assert_eq!(wire_type_of(&Value::from(1usize)), (WireType::LongLong, true));

        let int = column(WireType::Long, 0, BINARY_CHARSET, 11);
        assert_eq!(round_trip(Value::I32(-7), &int), Value::I32(-7));

        let uint = column(WireType::LongLong, ColumnFlags::UNSIGNED, BINARY_CHARSET, 20);
        assert_eq!(round_trip(Value::U64(u64::MAX), &uint), Value::U64(u64::MAX));

        let tiny = column(WireType::Tiny, ColumnFlags::UNSIGNED, BINARY_CHARSET, 3);
        assert_eq!(round_trip(Value::U8(200), &tiny), Value::U8(200));
    }

    #[test]
    fn tinyint_one_is_bool() {
        let col = column(WireType::Tiny, 0, BINARY_CHARSET, 1);
        assert_eq!(round_trip(Value::Bool(true), &col), Value::Bool(true));
        assert_eq!(decode(&[0], &col).unwrap(), Value::Bool(false));
    }

    #[test]
    fn floats() {
        let col = column(WireType::Double, 0, BINARY_CHARSET, 22);
        assert_eq!(round_trip(Value::F64(1.5), &col), Value::F64(1.5));
        let col = column(WireType::Float, 0, BINARY_CHARSET, 12);
        assert_eq!(round_trip(Value::F32(-0.25), &col), Value::F32(-0.25));
    }

    #[test]
    fn text_and_binary() {
        let text = column(WireType::VarString, 0, 45, 1020);
        assert_eq!(round_trip(Value::from("héllo"), &text), Value::from("héllo"));

        let blob = column(WireType::Blob, ColumnFlags::BLOB | ColumnFlags::BINARY, BINARY_CHARSET, 65535);
        assert_eq!(round_trip(Value::Bytes(vec![0, 159, 146]), &blob), Value::Bytes(vec![0, 159, 146]));

        assert!(matches!(decode(&[0xC3, 0x28], &text), Err(DecodeError::Utf8(_))));
    }

    #[test]
    fn other_is_sent_as_text() {
        let value = Value::other(std::net::Ipv4Addr::LOCALHOST);
        assert_eq!(wire_type_of(&value), (WireType::String, false));

        let text = column(WireType::VarString, 0, 45, 1020);
        assert_eq!(round_trip(value, &text), Value::from("127.0.0.1"));
    }

    #[test]
    fn decimal_is_exact_text() {
        let col = column(WireType::NewDecimal, 0, BINARY_CHARSET, 12);
        assert_eq!(decode(b"12345.6789", &col).unwrap(), Value::from("12345.6789"));
    }

    #[test]
    fn temporal_is_sent_as_text() {
        let mut buf = Vec::new();
        let value = Value::DateTime(datetime!(2024-02-29 13:45:01));
        encode(&value, ColumnKind::Other, &mut buf);
        assert_eq!(buf, b"2024-02-29 13:45:01");
        assert_eq!(wire_type_of(&value), (WireType::String, false));

        buf.clear();
        encode(&value, ColumnKind::Date, &mut buf);
        assert_eq!(buf, b"2024-02-29");
        assert_eq!(encoded_len(&value, ColumnKind::Date), 10);

        buf.clear();
        encode(&value, ColumnKind::Time, &mut buf);
        assert_eq!(buf, b"13:45:01");

        buf.clear();
        encode(&Value::Time(time!(08:00:00.25)), ColumnKind::Other, &mut buf);
        assert_eq!(buf, b"08:00:00.250000");
    }

    #[test]
    fn temporal_decode() {
        let col = column(WireType::DateTime, ColumnFlags::BINARY, BINARY_CHARSET, 19);
        let raw = [0xE8, 0x07, 2, 29, 13, 45, 1];
        assert_eq!(decode(&raw, &col).unwrap(), Value::DateTime(datetime!(2024-02-29 13:45:01)));

        let col = column(WireType::Date, ColumnFlags::BINARY, BINARY_CHARSET, 10);
        assert_eq!(decode(&[0xE8, 0x07, 2, 29], &col).unwrap(), Value::Date(date!(2024-02-29)));
        assert_eq!(decode(&[], &col).unwrap(), Value::from("0000-00-00"));

        let col = column(WireType::Time, ColumnFlags::BINARY, BINARY_CHARSET, 10);
        assert_eq!(decode(&[0, 0, 0, 0, 0, 8, 30, 0], &col).unwrap(), Value::Time(time!(08:30:00)));
        assert_eq!(decode(&[1, 1, 0, 0, 0, 2, 0, 0], &col).unwrap(), Value::from("-26:00:00"));
    }

    #[test]
    fn temporal_bounds() {
        let date = column(WireType::Date, ColumnFlags::BINARY, BINARY_CHARSET, 10);
        assert_eq!(decode(&[0xE8, 0x03, 1, 1], &date).unwrap(), Value::Date(date!(1000-01-01)));
        assert_eq!(decode(&[0x0F, 0x27, 12, 31], &date).unwrap(), Value::Date(date!(9999-12-31)));

        let datetime = column(WireType::DateTime, ColumnFlags::BINARY, BINARY_CHARSET, 26);
        let max = [0x0F, 0x27, 12, 31, 23, 59, 59, 0x3F, 0x42, 0x0F, 0x00];
        assert_eq!(decode(&max, &datetime).unwrap(), Value::DateTime(datetime!(9999-12-31 23:59:59.999999)));
        assert_eq!(decode(&[], &datetime).unwrap(), Value::from("0000-00-00 00:00:00"));

        let time = column(WireType::Time, ColumnFlags::BINARY, BINARY_CHARSET, 17);
        assert_eq!(decode(&[], &time).unwrap(), Value::Time(time!(00:00:00)));
        let end_of_day = [0, 0, 0, 0, 0, 23, 59, 59, 0x3F, 0x42, 0x0F, 0x00];
        assert_eq!(decode(&end_of_day, &time).unwrap(), Value::Time(time!(23:59:59.999999)));
        assert_eq!(decode(&[0, 34, 0, 0, 0, 22, 59, 59], &time).unwrap(), Value::from("838:59:59"));
        assert_eq!(decode(&[1, 34, 0, 0, 0, 22, 59, 59], &time).unwrap(), Value::from("-838:59:59"));

        let mut buf = Vec::new();
        encode(&Value::Date(date!(1000-01-01)), ColumnKind::Other, &mut buf);
        assert_eq!(buf, b"1000-01-01");
        buf.clear();
        encode(&Value::DateTime(datetime!(9999-12-31 23:59:59.999999)), ColumnKind::Other, &mut buf);
        assert_eq!(buf, b"9999-12-31 23:59:59.999999");
        buf.clear();
        encode(&Value::Time(time!(00:00:00)), ColumnKind::Other, &mut buf);
        assert_eq!(buf, b"00:00:00");
    }

    #[test]
    fn output_sizes() {
        assert_eq!(size_of(&column(WireType::LongLong, 0, BINARY_CHARSET, 20)), 8);
        assert_eq!(size_of(&column(WireType::Timestamp, 0, BINARY_CHARSET, 19)), 11);
        assert_eq!(size_of(&column(WireType::VarString, 0, 45, 1020)), 1020);
        assert_eq!(size_of(&column(WireType::LongBlob, 0, BINARY_CHARSET, u32::MAX)), OUTPUT_BUFFER_CEILING);
    }

    #[test]
    fn split_binary_values() {
        let mut row = Bytes::from_static(b"\x2A\x00\x00\x00\x04\xE8\x07\x02\x1D\x03abc");
        assert_eq!(&split_value(WireType::Long, &mut row).unwrap()[..], &[42, 0, 0, 0]);
        assert_eq!(&split_value(WireType::Date, &mut row).unwrap()[..], &[0xE8, 0x07, 2, 29]);
        assert_eq!(&split_value(WireType::VarString, &mut row).unwrap()[..], b"abc");
        assert!(row.is_empty());
        assert!(split_value(WireType::Long, &mut row).is_err());
    }
}
