use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Decode, DecodeError, Encode, Value, row::Column};

/// Decode and Encode mysql `JSON` value.
///
/// # Panics
///
/// Note that when performing [`Encode`], if [`Serialize`] implementation decide
/// to fail, it will panics.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T> Decode for Json<T>
where
    T: DeserializeOwned,
{
    fn decode(column: Column) -> Result<Self, DecodeError> {
        match column.try_into_value()? {
            Value::Text(text) => Ok(Json(serde_json::from_str(&text)?)),
            Value::Bytes(bytes) => Ok(Json(serde_json::from_slice(&bytes)?)),
            value => Err(DecodeError::mismatch::<Self>(&value)),
        }
    }
}

impl<T: Serialize> Encode for Json<T> {
    fn encode(self) -> Option<Value> {
        let json = serde_json::to_string(&self.0).expect("`Serialize` implementation failed");
        Some(Value::Text(json))
    }
}

impl<T: Serialize> Serialize for Json<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Json<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self(T::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_json_column() {
        let column = Column::new("doc".into(), Some(Value::from(r#"[1,2,3]"#)));
        let Json(list) = column.decode::<Json<Vec<i32>>>().unwrap();
        assert_eq!(list, [1, 2, 3]);
    }

    #[test]
    fn encode_as_text() {
        assert_eq!(Json(vec!["a"]).encode(), Some(Value::from(r#"["a"]"#)));
    }
}
