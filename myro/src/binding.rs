//! Parameter and result buffers of a prepared statement.
use crate::{
    describe::ColumnDescriptor,
    error::ParameterCountMismatch,
    ext::UsizeExt,
    mysql::WireType,
    row::DecodeError,
    types,
    value::{ColumnKind, Value},
};

/// A single parameter or column buffer.
///
/// Input binding holds an encoded parameter, its buffer is reallocated only
/// when a new value does not fit the previous allocation.
///
/// Output binding holds the raw value of one column of the current row, its
/// buffer is sized from the column description and reused across rows.
#[derive(Debug, Clone)]
pub struct Binding {
    wire_type: WireType,
    unsigned: bool,
    null: bool,
    truncated: bool,
    /// Initial output buffer size, a larger value is truncated.
    declared: usize,
    buffer: Vec<u8>,
}

impl Binding {
    /// Create an unset input binding, which is `NULL`.
    pub fn input() -> Self {
        Self {
            wire_type: WireType::Null,
            unsigned: false,
            null: true,
            truncated: false,
            declared: 0,
            buffer: Vec::new(),
        }
    }

    /// Create output binding for `column`.
    pub fn output(column: &ColumnDescriptor) -> Self {
        let declared = types::size_of(column);
        Self {
            wire_type: column.wire_type(),
            unsigned: column.is_unsigned(),
            null: true,
            truncated: false,
            declared,
            buffer: Vec::with_capacity(declared),
        }
    }

    /// Bind `NULL`, the buffer is left untouched.
    pub fn set_null(&mut self) {
        self.wire_type = WireType::Null;
        self.unsigned = false;
        self.null = true;
    }

    /// Encode `value` into the buffer.
    ///
    /// Returns `true` if the buffer is reallocated.
    pub fn set_value(&mut self, value: &Value, kind: ColumnKind) -> bool {
        let (wire_type, unsigned) = types::wire_type_of(value);
        let required = types::encoded_len(value, kind);

        let reallocated = required > self.buffer.capacity();
        match reallocated {
            true => self.buffer = Vec::with_capacity(required),
            false => self.buffer.clear(),
        }
        types::encode(value, kind, &mut self.buffer);

        self.wire_type = wire_type;
        self.unsigned = unsigned;
        self.null = false;
        reallocated
    }

    /// Store raw column value of the current row.
    ///
    /// A value larger than the declared size sets the truncation flag, the
    /// buffer grows to keep the whole value.
    pub fn fill(&mut self, raw: &[u8]) {
        self.truncated = raw.len() > self.declared;
        if raw.len() > self.buffer.capacity() {
            #[cfg(feature = "log")]
            log::debug!(
                "{} value of {} bytes exceeds buffer of {} bytes, growing",
                self.wire_type.name(),
                raw.len(),
                self.buffer.capacity(),
            );
        }
        self.buffer.clear();
        self.buffer.extend_from_slice(raw);
        self.null = false;
    }

    /// Mark current row value as `NULL`.
    pub fn fill_null(&mut self) {
        self.buffer.clear();
        self.truncated = false;
        self.null = true;
    }

    /// Decode current row value.
    pub fn decode(&self, column: &ColumnDescriptor) -> Result<Option<Value>, DecodeError> {
        if self.null {
            return Ok(None);
        }
        let raw = match self.wire_type.is_temporal() {
            true => &self.buffer[..self.buffer.len().min(types::size_of(column))],
            false => &self.buffer[..],
        };
        types::decode(raw, column).map(Some)
    }

    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    pub fn is_unsigned(&self) -> bool {
        self.unsigned
    }

    pub fn is_null(&self) -> bool {
        self.null
    }

    /// Returns `true` if the last value is larger than the declared size.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Length of the current value in bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Allocated buffer size.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of bytes written in `COM_STMT_EXECUTE`, including length prefix
    /// for variable sized type.
    pub(crate) fn wire_len(&self) -> usize {
        match self.wire_type.fixed_size() {
            Some(size) => size,
            None => self.buffer.len().lenenc_len() + self.buffer.len(),
        }
    }
}

/// Input bindings of a prepared statement.
///
/// The number of bindings is fixed at creation.
#[derive(Debug)]
pub struct InputBindings {
    bindings: Vec<Binding>,
    reallocations: usize,
}

impl InputBindings {
    pub fn with_count(count: usize) -> Self {
        Self {
            bindings: (0..count).map(|_| Binding::input()).collect(),
            reallocations: 0,
        }
    }

    /// Bind all parameters.
    ///
    /// `kinds` is the declared kind of each parameter target column, missing
    /// entry is [`ColumnKind::Other`].
    pub fn bind(&mut self, params: &[Option<Value>], kinds: &[ColumnKind]) -> Result<(), ParameterCountMismatch> {
        if params.len() != self.bindings.len() {
            return Err(ParameterCountMismatch { expected: self.bindings.len(), found: params.len() });
        }
        for (i, (binding, param)) in self.bindings.iter_mut().zip(params).enumerate() {
            match param {
                Some(value) => {
                    let kind = kinds.get(i).copied().unwrap_or_default();
                    if binding.set_value(value, kind) {
                        self.reallocations += 1;
                    }
                }
                None => binding.set_null(),
            }
        }
        Ok(())
    }

    pub fn as_slice(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Number of buffer reallocations since creation.
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    /// Total allocated buffer size.
    pub fn capacity(&self) -> usize {
        self.bindings.iter().map(Binding::capacity).sum()
    }
}

#[cfg(test)]
mod test {
    use time::macros::datetime;

    use super::*;
    use crate::mysql::{BINARY_CHARSET, ColumnFlags};

    #[test]
    fn null_has_no_buffer_work() {
        let mut bindings = InputBindings::with_count(2);
        bindings.bind(&[None, Some(Value::I32(1))], &[]).unwrap();
        let [null, int] = bindings.as_slice() else { unreachable!() };
        assert!(null.is_null());
        assert_eq!(null.wire_type(), WireType::Null);
        assert_eq!(null.capacity(), 0);
        assert_eq!(int.wire_type(), WireType::Long);
        assert_eq!(int.as_slice(), 1i32.to_le_bytes());
        assert_eq!(int.wire_len(), 4);
    }

    #[test]
    fn count_mismatch() {
        let mut bindings = InputBindings::with_count(2);
        let err = bindings.bind(&[Some(Value::I8(1))], &[]).unwrap_err();
        assert_eq!(err, ParameterCountMismatch { expected: 2, found: 1 });
    }

    #[test]
    fn buffers_grow_only() {
        let mut bindings = InputBindings::with_count(1);
        bindings.bind(&[Some(Value::from("a long enough value"))], &[]).unwrap();
        assert_eq!(bindings.reallocations(), 1);
        let capacity = bindings.capacity();

        bindings.bind(&[Some(Value::from("short"))], &[]).unwrap();
        bindings.bind(&[None], &[]).unwrap();
        bindings.bind(&[Some(Value::from("short again"))], &[]).unwrap();
        assert_eq!(bindings.reallocations(), 1);
        assert_eq!(bindings.capacity(), capacity);
        assert_eq!(bindings.as_slice()[0].as_slice(), b"short again");
        assert_eq!(bindings.as_slice()[0].wire_len(), 12);

        bindings.bind(&[Some(Value::from("a value longer than any of the previous one"))], &[]).unwrap();
        assert_eq!(bindings.reallocations(), 2);
    }

    #[test]
    fn declared_kind_narrows_datetime() {
        let mut bindings = InputBindings::with_count(1);
        let value = Value::DateTime(datetime!(2020-05-06 07:08:09));
        bindings.bind(&[Some(value)], &[ColumnKind::Date]).unwrap();
        assert_eq!(bindings.as_slice()[0].as_slice(), b"2020-05-06");
    }

    #[test]
    fn output_truncation_grows() {
        let column = ColumnDescriptor::new("name", WireType::VarString, ColumnFlags(0), 45, 4);
        let mut output = Binding::output(&column);
        assert_eq!(output.capacity(), 4);

        output.fill(b"abc");
        assert!(!output.is_truncated());
        assert_eq!(output.decode(&column).unwrap(), Some(Value::from("abc")));

        output.fill(b"abcdefgh");
        assert!(output.is_truncated());
        assert_eq!(output.decode(&column).unwrap(), Some(Value::from("abcdefgh")));

        // grown buffer does not hide the next oversized value
        output.fill(b"ijklmnop");
        assert!(output.is_truncated());
        assert!(output.capacity() >= 8);
        output.fill(b"qrs");
        assert!(!output.is_truncated());

        output.fill_null();
        assert_eq!(output.decode(&column).unwrap(), None);
    }

    fn col(wire_type: WireType, flags: u16, charset: u16, length: u32) -> ColumnDescriptor {
        ColumnDescriptor::new("c", wire_type, ColumnFlags(flags), charset, length)
    }

    /// Parameter buffer as the server echoes it back into an output buffer.
    fn echo(value: Option<Value>, column: &ColumnDescriptor) -> Option<Value> {
        let mut inputs = InputBindings::with_count(1);
        inputs.bind(&[value], &[]).unwrap();
        let input = &inputs.as_slice()[0];

        let mut output = Binding::output(column);
        match input.is_null() {
            true => output.fill_null(),
            false => output.fill(input.as_slice()),
        }
        output.decode(column).unwrap()
    }

    #[test]
    fn scalar_bounds_round_trip() {
        const UNSIGNED: u16 = ColumnFlags::UNSIGNED;
        let long_text = "x".repeat(70_000);
        let long_bytes = vec![0xFF; 70_000];

        let cases = [
            (col(WireType::Tiny, 0, BINARY_CHARSET, 4), vec![Value::I8(i8::MIN), Value::I8(0), Value::I8(i8::MAX)]),
            (col(WireType::Tiny, UNSIGNED, BINARY_CHARSET, 3), vec![Value::U8(0), Value::U8(u8::MAX)]),
            (col(WireType::Tiny, 0, BINARY_CHARSET, 1), vec![Value::Bool(false), Value::Bool(true)]),
            (col(WireType::Short, 0, BINARY_CHARSET, 6), vec![Value::I16(i16::MIN), Value::I16(0), Value::I16(i16::MAX)]),
            (col(WireType::Short, UNSIGNED, BINARY_CHARSET, 5), vec![Value::U16(0), Value::U16(u16::MAX)]),
            (col(WireType::Long, 0, BINARY_CHARSET, 11), vec![Value::I32(i32::MIN), Value::I32(0), Value::I32(i32::MAX)]),
            (col(WireType::Long, UNSIGNED, BINARY_CHARSET, 10), vec![Value::U32(0), Value::U32(u32::MAX)]),
            (col(WireType::LongLong, 0, BINARY_CHARSET, 20), vec![Value::I64(i64::MIN), Value::I64(0), Value::I64(i64::MAX)]),
            (col(WireType::LongLong, UNSIGNED, BINARY_CHARSET, 20), vec![Value::U64(0), Value::U64(u64::MAX)]),
            (
                col(WireType::Float, 0, BINARY_CHARSET, 12),
                vec![Value::F32(f32::MIN), Value::F32(f32::MIN_POSITIVE), Value::F32(0.0), Value::F32(f32::MAX)],
            ),
            (
                col(WireType::Double, 0, BINARY_CHARSET, 22),
                vec![Value::F64(f64::MIN), Value::F64(f64::MIN_POSITIVE), Value::F64(0.0), Value::F64(f64::MAX)],
            ),
            (col(WireType::VarString, 0, 45, 1020), vec![Value::from(""), Value::from("héllo")]),
            (col(WireType::LongBlob, ColumnFlags::BLOB, 45, u32::MAX), vec![Value::from(long_text.as_str())]),
            (
                col(WireType::Blob, ColumnFlags::BLOB | ColumnFlags::BINARY, BINARY_CHARSET, 65535),
                vec![Value::Bytes(vec![]), Value::Bytes(vec![0, 255])],
            ),
            (
                col(WireType::LongBlob, ColumnFlags::BLOB | ColumnFlags::BINARY, BINARY_CHARSET, u32::MAX),
                vec![Value::Bytes(long_bytes)],
            ),
        ];

        for (column, values) in cases {
            for value in values {
                assert_eq!(echo(Some(value.clone()), &column), Some(value), "{}", column.wire_type().name());
            }
            assert_eq!(echo(None, &column), None, "{}", column.wire_type().name());
        }
    }

    #[test]
    fn temporal_output_is_clamped() {
        let column = ColumnDescriptor::new("d", WireType::Date, ColumnFlags(ColumnFlags::BINARY), BINARY_CHARSET, 10);
        let mut output = Binding::output(&column);
        output.fill(&[0xE4, 0x07, 1, 2]);
        assert_eq!(output.decode(&column).unwrap(), Some(Value::Date(time::macros::date!(2020-01-02))));
    }
}
