//! Typed access to binary result set rows.
//!
//! A [`Row`] pairs the statement's [`ColumnDescriptor`]s with the decoded
//! [`Value`]s. Columns are picked by position or name through [`Index`] and
//! converted with [`Decode`], whole rows with [`FromRow`].
use std::{borrow::Cow, fmt, iter::Enumerate, str::Utf8Error, string::FromUtf8Error, sync::Arc, vec};

use crate::{
    common::{ByteStr, unit_error},
    describe::ColumnDescriptor,
    mysql::WireType,
    value::Value,
};

/// One row of a result set, `NULL` is `None`.
#[derive(Clone)]
pub struct Row {
    columns: Arc<[ColumnDescriptor]>,
    values: Vec<Option<Value>>,
}

impl Row {
    pub(crate) fn new(columns: Arc<[ColumnDescriptor]>, values: Vec<Option<Value>>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Description shared by every row of the result set.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    /// Decode a single column, picked by position or name.
    pub fn try_get<I: Index, R: Decode>(&self, idx: I) -> Result<R, DecodeError> {
        let nth = idx.position(&self.columns)?;
        R::decode(self.column(nth, self.values[nth].clone()))
    }

    /// Decode the whole row.
    pub fn decode<D: FromRow>(self) -> Result<D, DecodeError> {
        D::from_row(self)
    }

    fn column(&self, nth: usize, value: Option<Value>) -> Column {
        Column::new(ByteStr::copy_from_str(self.columns[nth].name()), value)
    }
}

impl IntoIterator for Row {
    type Item = Column;
    type IntoIter = Columns;

    fn into_iter(mut self) -> Columns {
        let values = std::mem::take(&mut self.values).into_iter().enumerate();
        Columns { row: self, values }
    }
}

/// Owning iterator over the [`Column`]s of a [`Row`].
pub struct Columns {
    row: Row,
    values: Enumerate<vec::IntoIter<Option<Value>>>,
}

impl Iterator for Columns {
    type Item = Column;

    fn next(&mut self) -> Option<Column> {
        let (nth, value) = self.values.next()?;
        Some(self.row.column(nth, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.values.size_hint()
    }
}

impl ExactSizeIterator for Columns { }

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (desc, value) in self.columns.iter().zip(&self.values) {
            match value {
                Some(value) => map.entry(&desc.name(), &format_args!("{value}")),
                None => map.entry(&desc.name(), &format_args!("NULL")),
            };
        }
        map.finish()
    }
}

/// Named value taken out of a [`Row`].
#[derive(Debug, Clone)]
pub struct Column {
    name: ByteStr,
    value: Option<Value>,
}

impl Column {
    pub fn new(name: ByteStr, value: Option<Value>) -> Self {
        Self { name, value }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn is_null(&self) -> bool {
        self.value.is_none()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<Value> {
        self.value
    }

    /// Take the value, failing with [`DecodeError::Null`] on `NULL`.
    pub fn try_into_value(self) -> Result<Value, DecodeError> {
        self.value.ok_or(DecodeError::Null)
    }

    pub fn decode<D: Decode>(self) -> Result<D, DecodeError> {
        D::decode(self)
    }
}

// ===== Traits =====

/// Conversion of a whole [`Row`], derivable with `#[derive(FromRow)]`.
///
/// Tuples decode columns by position, up to 8 columns.
pub trait FromRow: Sized {
    fn from_row(row: Row) -> Result<Self, DecodeError>;
}

impl FromRow for Row {
    fn from_row(row: Row) -> Result<Self, DecodeError> {
        Ok(row)
    }
}

impl FromRow for () {
    fn from_row(_: Row) -> Result<Self, DecodeError> {
        Ok(())
    }
}

macro_rules! tuples {
    ($($t:ident $i:tt)+) => {
        impl<$($t: Decode),+> FromRow for ($($t,)+) {
            fn from_row(row: Row) -> Result<Self, DecodeError> {
                Ok(($(row.try_get::<usize, $t>($i)?,)+))
            }
        }
    };
}

tuples!(A 0);
tuples!(A 0 B 1);
tuples!(A 0 B 1 C 2);
tuples!(A 0 B 1 C 2 D 3);
tuples!(A 0 B 1 C 2 D 3 E 4);
tuples!(A 0 B 1 C 2 D 3 E 4 F 5);
tuples!(A 0 B 1 C 2 D 3 E 4 F 5 G 6);
tuples!(A 0 B 1 C 2 D 3 E 4 F 5 G 6 H 7);

/// Conversion of a single [`Column`], derivable with `#[derive(Decode)]`.
pub trait Decode: Sized {
    fn decode(column: Column) -> Result<Self, DecodeError>;
}

impl Decode for Column {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        Ok(column)
    }
}

impl Decode for Value {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        column.try_into_value()
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        match column.is_null() {
            true => Ok(None),
            false => column.decode().map(Some),
        }
    }
}

impl Decode for () {
    fn decode(_: Column) -> Result<Self, DecodeError> {
        Ok(())
    }
}

macro_rules! decode_int {
    ($($ty:ty),*) => {
        $(
            impl Decode for $ty {
                fn decode(col: Column) -> Result<Self, DecodeError> {
                    let value = col.try_into_value()?;
                    let int = match &value {
                        Value::Text(text) => text.parse::<i128>().ok(),
                        value => value.as_integer(),
                    };
                    let Some(int) = int else {
                        return Err(DecodeError::mismatch::<Self>(&value));
                    };
                    <$ty>::try_from(int).map_err(|_| DecodeError::Overflow(std::any::type_name::<Self>()))
                }
            }
        )*
    };
}

decode_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl Decode for bool {
    fn decode(col: Column) -> Result<Self, DecodeError> {
        match col.try_into_value()? {
            Value::Bool(b) => Ok(b),
            value => match value.as_integer() {
                Some(int) => Ok(int != 0),
                None => Err(DecodeError::mismatch::<Self>(&value)),
            },
        }
    }
}

impl Decode for f32 {
    fn decode(col: Column) -> Result<Self, DecodeError> {
        match col.try_into_value()? {
            Value::F32(f) => Ok(f),
            Value::Text(text) => text.parse().map_err(|_| DecodeError::Malformed(WireType::NewDecimal)),
            value => Err(DecodeError::mismatch::<Self>(&value)),
        }
    }
}

impl Decode for f64 {
    fn decode(col: Column) -> Result<Self, DecodeError> {
        match col.try_into_value()? {
            Value::F64(f) => Ok(f),
            Value::F32(f) => Ok(f.into()),
            Value::Text(text) => text.parse().map_err(|_| DecodeError::Malformed(WireType::NewDecimal)),
            value => match value.as_integer() {
                Some(int) => Ok(int as f64),
                None => Err(DecodeError::mismatch::<Self>(&value)),
            },
        }
    }
}

impl Decode for String {
    fn decode(col: Column) -> Result<Self, DecodeError> {
        match col.try_into_value()? {
            Value::Text(text) | Value::Other(text) => Ok(text),
            Value::Bytes(bytes) => Ok(String::from_utf8(bytes)?),
            value => Err(DecodeError::mismatch::<Self>(&value)),
        }
    }
}

impl Decode for Vec<u8> {
    fn decode(col: Column) -> Result<Self, DecodeError> {
        match col.try_into_value()? {
            Value::Bytes(bytes) => Ok(bytes),
            Value::Text(text) => Ok(text.into_bytes()),
            value => Err(DecodeError::mismatch::<Self>(&value)),
        }
    }
}

/// Column position or name, see [`Row::try_get`].
pub trait Index: Sized + sealed::Sealed {
    fn position(self, columns: &[ColumnDescriptor]) -> Result<usize, DecodeError>;
}

impl Index for usize {
    fn position(self, columns: &[ColumnDescriptor]) -> Result<usize, DecodeError> {
        match self < columns.len() {
            true => Ok(self),
            false => Err(DecodeError::IndexOutOfBounds(self)),
        }
    }
}

impl Index for &str {
    fn position(self, columns: &[ColumnDescriptor]) -> Result<usize, DecodeError> {
        columns
            .iter()
            .position(|col| col.name() == self)
            .ok_or_else(|| DecodeError::ColumnNotFound(String::from(self).into()))
    }
}

mod sealed {
    pub trait Sealed { }
    impl Sealed for usize { }
    impl Sealed for &str { }
}

unit_error! {
    /// An error when try to [`fetch_one`][crate::query::Query::fetch_one] and not returns any row.
    pub struct RowNotFound("row not found");
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for DecodeError {
            fn from($pat: $ty) -> Self {
                $body
            }
        }
    };
}

/// An error when decoding row value.
pub enum DecodeError {
    /// Server returns non utf8 string.
    Utf8(Utf8Error),
    /// Column requested not found.
    ColumnNotFound(Cow<'static,str>),
    /// Index requested is out of bounds.
    IndexOutOfBounds(usize),
    /// Value type cannot be decoded into requested type.
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// Binary value length does not match its type.
    Malformed(WireType),
    /// Row is null.
    Null,
    /// Integer does not fit requested type.
    Overflow(&'static str),
    /// Failed to parse temporal text.
    Time(time::error::Parse),
    /// Failed to deserialize using `serde_json`.
    #[cfg(feature = "json")]
    Json(serde_json::error::Error),
}

impl DecodeError {
    pub(crate) fn mismatch<T>(found: &Value) -> Self {
        Self::TypeMismatch {
            expected: std::any::type_name::<T>(),
            found: found.type_name(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to decode value, ")?;
        match self {
            Self::Utf8(e) => write!(f, "{e}"),
            Self::ColumnNotFound(name) => write!(f, "column not found: {name:?}"),
            Self::IndexOutOfBounds(u) => write!(f, "index out of bounds: {u:?}"),
            Self::TypeMismatch { expected, found } => write!(f, "cannot decode {found} as {expected}"),
            Self::Malformed(ty) => write!(f, "malformed {} value", ty.name()),
            Self::Null => write!(f, "unexpected NULL value"),
            Self::Overflow(ty) => write!(f, "value out of range for {ty}"),
            Self::Time(e) => write!(f, "{e}"),
            #[cfg(feature = "json")]
            Self::Json(e) => write!(f, "{e}"),
        }
    }
}

from!(<Utf8Error>e => Self::Utf8(e));
from!(<FromUtf8Error>e => Self::Utf8(e.utf8_error()));
from!(<time::error::Parse>e => Self::Time(e));
#[cfg(feature = "json")]
from!(<serde_json::error::Error>e => Self::Json(e));

impl std::error::Error for DecodeError { }

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mysql::{BINARY_CHARSET, ColumnFlags};

    fn row() -> Row {
        let columns: Arc<[ColumnDescriptor]> = vec![
            ColumnDescriptor::new("id", WireType::LongLong, ColumnFlags(ColumnFlags::UNSIGNED), BINARY_CHARSET, 20),
            ColumnDescriptor::new("name", WireType::VarString, ColumnFlags(0), 45, 1020),
            ColumnDescriptor::new("score", WireType::NewDecimal, ColumnFlags(0), BINARY_CHARSET, 10),
        ]
        .into();
        Row::new(columns, vec![Some(Value::U64(7)), None, Some(Value::from("12.50"))])
    }

    #[test]
    fn get_by_index_and_name() {
        let row = row();
        assert_eq!(row.try_get::<_, i32>(0).unwrap(), 7);
        assert_eq!(row.try_get::<_, Option<String>>("name").unwrap(), None);
        assert_eq!(row.try_get::<_, f64>("score").unwrap(), 12.5);
        assert!(matches!(row.try_get::<_, String>(1), Err(DecodeError::Null)));
        assert!(matches!(row.try_get::<_, i32>(3), Err(DecodeError::IndexOutOfBounds(3))));
        assert!(matches!(row.try_get::<_, i32>("nope"), Err(DecodeError::ColumnNotFound(_))));
    }

    #[test]
    fn integer_conversion() {
        let col = Column::new("n".into(), Some(Value::I64(300)));
        assert!(matches!(col.clone().decode::<u8>(), Err(DecodeError::Overflow(_))));
        assert_eq!(col.decode::<i16>().unwrap(), 300);

        let col = Column::new("n".into(), Some(Value::from("42")));
        assert_eq!(col.decode::<u64>().unwrap(), 42);

        let col = Column::new("n".into(), Some(Value::Bytes(vec![1])));
        assert!(matches!(col.decode::<i32>(), Err(DecodeError::TypeMismatch { found: "bytes", .. })));
    }

    #[test]
    fn tuple_and_iter() {
        let (id, name, score) = row().decode::<(u64, Option<String>, String)>().unwrap();
        assert_eq!((id, name.as_deref(), score.as_str()), (7, None, "12.50"));

        let names = row().into_iter().map(|c| c.name().to_owned()).collect::<Vec<_>>();
        assert_eq!(names, ["id", "name", "score"]);
    }

    #[test]
    fn debug_map() {
        assert_eq!(format!("{:?}", row()), r#"{"id": 7, "name": NULL, "score": 12.50}"#);
    }
}
