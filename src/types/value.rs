use crate::catalog::field::StorageType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single collected datum, typed after the storage column it is written to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    /// Converts a JSON value into the representation required by `storage_type`.
    ///
    /// Returns `None` for JSON `null` and for values that do not fit the column
    /// type. Integer columns accept floats without a fractional part, since the
    /// API is not always consistent about `65` versus `65.0`.
    pub fn from_json(value: &Value, storage_type: StorageType) -> Option<Self> {
        match storage_type {
            StorageType::Real => value.as_f64().map(FieldValue::Real),
            StorageType::Integer => value.as_i64().map(FieldValue::Integer).or_else(|| {
                value
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| FieldValue::Integer(f as i64))
            }),
            StorageType::Text => value.as_str().map(|s| FieldValue::Text(s.to_string())),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Real(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{v}"),
            FieldValue::Real(v) => write!(f, "{v}"),
            FieldValue::Text(v) => f.write_str(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_respects_storage_type() {
        assert_eq!(
            FieldValue::from_json(&json!(20.5), StorageType::Real),
            Some(FieldValue::Real(20.5))
        );
        assert_eq!(
            FieldValue::from_json(&json!(65), StorageType::Integer),
            Some(FieldValue::Integer(65))
        );
        assert_eq!(
            FieldValue::from_json(&json!(65.0), StorageType::Integer),
            Some(FieldValue::Integer(65))
        );
        assert_eq!(FieldValue::from_json(&json!(65.5), StorageType::Integer), None);
        assert_eq!(
            FieldValue::from_json(&json!("Clouds"), StorageType::Text),
            Some(FieldValue::Text("Clouds".into()))
        );
        assert_eq!(FieldValue::from_json(&json!("Clouds"), StorageType::Real), None);
        assert_eq!(FieldValue::from_json(&Value::Null, StorageType::Real), None);
    }
}
