use time::{
    Date, Month, PrimitiveDateTime, Time,
    format_description::{BorrowedFormatItem as I, Component as C, modifier},
};

use crate::{
    Decode, DecodeError,
    row::Column,
    value::{ColumnKind, Value},
};

/// Binary `MYSQL_TIME` of a `TIME` value, with microseconds.
pub(super) const TIME_LEN: usize = 12;

/// Binary `MYSQL_TIME` of a `DATE`, `DATETIME` or `TIMESTAMP` value, with microseconds.
pub(super) const DATETIME_LEN: usize = 11;

pub(super) fn formatted_len(value: &Value, kind: ColumnKind) -> usize {
    let mut buf = Vec::with_capacity(26);
    format_into(value, kind, &mut buf);
    buf.len()
}

pub(super) fn format_into(value: &Value, kind: ColumnKind, buf: &mut Vec<u8>) {
    let formatted = match (value, kind) {
        (Value::Date(date), _) => format_date(*date),
        (Value::DateTime(dt), ColumnKind::Date) => format_date(dt.date()),
        (Value::DateTime(dt), ColumnKind::Time) => format_time(dt.time()),
        (Value::DateTime(dt), _) => format!("{} {}", format_date(dt.date()), format_time(dt.time())),
        (Value::Time(time), _) => format_time(*time),
        _ => return,
    };
    buf.extend_from_slice(formatted.as_bytes());
}

fn format_date(date: Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month() as u8, date.day())
}

fn format_time(time: Time) -> String {
    let (h, m, s, micro) = time.as_hms_micro();
    match micro {
        0 => format!("{h:02}:{m:02}:{s:02}"),
        _ => format!("{h:02}:{m:02}:{s:02}.{micro:06}"),
    }
}

fn le_u16(raw: &[u8]) -> u16 {
    u16::from_le_bytes([raw[0], raw[1]])
}

fn le_u32(raw: &[u8]) -> u32 {
    u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
}

/// Decode binary `DATE`, `DATETIME` or `TIMESTAMP`.
///
/// ```text
/// len  year  month  day  hour  minute  second  micro
/// 0    zero date
/// 4    u16   u8     u8
/// 7    u16   u8     u8   u8    u8      u8
/// 11   u16   u8     u8   u8    u8      u8      u32
/// ```
pub(super) fn decode_date(raw: &[u8], with_time: bool) -> Result<Value, DecodeError> {
    let (year, month, day) = match raw.len() {
        0 => (0, 0, 0),
        4 | 7 | 11 => (le_u16(raw), raw[2], raw[3]),
        _ => return Err(DecodeError::Malformed(crate::mysql::WireType::DateTime)),
    };
    let (hour, minute, second) = match raw.len() {
        7 | 11 => (raw[4], raw[5], raw[6]),
        _ => (0, 0, 0),
    };
    let micro = match raw.len() {
        11 => le_u32(&raw[7..]),
        _ => 0,
    };

    let date = Month::try_from(month)
        .ok()
        .and_then(|month| Date::from_calendar_date(year as i32, month, day).ok());
    let time = Time::from_hms_micro(hour, minute, second, micro).ok();

    match (date, time, with_time) {
        (Some(date), _, false) => return Ok(Value::Date(date)),
        (Some(date), Some(time), true) => return Ok(Value::DateTime(PrimitiveDateTime::new(date, time))),
        _ => {}
    }

    let mut text = format!("{year:04}-{month:02}-{day:02}");
    if with_time {
        text.push_str(&format!(" {hour:02}:{minute:02}:{second:02}"));
        if micro != 0 {
            text.push_str(&format!(".{micro:06}"));
        }
    }

    #[cfg(feature = "log")]
    log::warn!("date {text:?} is not representable, decoded as text");

    Ok(Value::Text(text))
}

/// Decode binary `TIME`.
///
/// ```text
/// len  negative  days  hour  minute  second  micro
/// 0    00:00:00
/// 8    u8        u32   u8    u8      u8
/// 12   u8        u32   u8    u8      u8      u32
/// ```
pub(super) fn decode_time(raw: &[u8]) -> Result<Value, DecodeError> {
    let (negative, days, hour, minute, second) = match raw.len() {
        0 => return Ok(Value::Time(Time::MIDNIGHT)),
        8 | 12 => (raw[0] != 0, le_u32(&raw[1..]), raw[5], raw[6], raw[7]),
        _ => return Err(DecodeError::Malformed(crate::mysql::WireType::Time)),
    };
    let micro = match raw.len() {
        12 => le_u32(&raw[8..]),
        _ => 0,
    };

    if !negative && days == 0 {
        if let Ok(time) = Time::from_hms_micro(hour, minute, second, micro) {
            return Ok(Value::Time(time));
        }
    }

    let sign = if negative { "-" } else { "" };
    let hours = days as u64 * 24 + hour as u64;
    let mut text = format!("{sign}{hours:02}:{minute:02}:{second:02}");
    if micro != 0 {
        text.push_str(&format!(".{micro:06}"));
    }

    #[cfg(feature = "log")]
    log::warn!("time {text:?} is outside a single day, decoded as text");

    Ok(Value::Text(text))
}

const DATE: &[I<'_>] = &[
    I::Component(C::Year(modifier::Year::default())),
    I::Literal(b"-"),
    I::Component(C::Month(modifier::Month::default())),
    I::Literal(b"-"),
    I::Component(C::Day(modifier::Day::default())),
];

const TIME: &[I<'_>] = &[
    I::Component(C::Hour(modifier::Hour::default())),
    I::Literal(b":"),
    I::Component(C::Minute(modifier::Minute::default())),
    I::Literal(b":"),
    I::Component(C::Second(modifier::Second::default())),
    I::Optional(&I::Compound(&[
        I::Literal(b"."),
        I::Component(C::Subsecond(modifier::Subsecond::default())),
    ])),
];

const DATETIME: &[I<'_>] = &[
    I::Compound(DATE),
    I::Literal(b" "),
    I::Compound(TIME),
];

impl Decode for Date {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        match column.try_into_value()? {
            Value::Date(date) => Ok(date),
            Value::DateTime(dt) => Ok(dt.date()),
            Value::Text(text) => Ok(Date::parse(&text, DATE)?),
            value => Err(DecodeError::mismatch::<Self>(&value)),
        }
    }
}

impl Decode for Time {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        match column.try_into_value()? {
            Value::Time(time) => Ok(time),
            Value::DateTime(dt) => Ok(dt.time()),
            Value::Text(text) => Ok(Time::parse(&text, TIME)?),
            value => Err(DecodeError::mismatch::<Self>(&value)),
        }
    }
}

impl Decode for PrimitiveDateTime {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        match column.try_into_value()? {
            Value::DateTime(dt) => Ok(dt),
            Value::Date(date) => Ok(date.midnight()),
            Value::Text(text) => Ok(PrimitiveDateTime::parse(&text, DATETIME)?),
            value => Err(DecodeError::mismatch::<Self>(&value)),
        }
    }
}
