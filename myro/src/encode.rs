//! The [`Encode`] trait.
use time::{Date, PrimitiveDateTime, Time};

use crate::value::Value;

/// A type that can be bound as statement parameter.
///
/// Returns [`None`] for `NULL`.
pub trait Encode {
    /// Convert self into parameter value.
    fn encode(self) -> Option<Value>;
}

macro_rules! encode {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(self) -> Option<Value> {
                    Some(Value::from(self))
                }
            }
        )*
    };
}

encode! {
    bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64,
    String, &str, Vec<u8>, &[u8],
    Date, Time, PrimitiveDateTime,
}

impl Encode for &String {
    fn encode(self) -> Option<Value> {
        Some(Value::Text(self.clone()))
    }
}

impl<const N: usize> Encode for &[u8; N] {
    fn encode(self) -> Option<Value> {
        Some(Value::Bytes(self.to_vec()))
    }
}

impl Encode for Value {
    fn encode(self) -> Option<Value> {
        Some(self)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(self) -> Option<Value> {
        self.and_then(Encode::encode)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn null_and_values() {
        assert_eq!(None::<i32>.encode(), None);
        assert_eq!(Some(4u16).encode(), Some(Value::U16(4)));
        assert_eq!("a".encode(), Some(Value::Text("a".into())));
        assert_eq!(b"ab".encode(), Some(Value::Bytes(vec![b'a', b'b'])));
        assert_eq!(7usize.encode(), Some(Value::U64(7)));
    }
}
