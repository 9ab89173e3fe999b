use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Declared value kind of a field.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ValueKind {
    Boolean,
    Number,
    BoundedNumber { min: Option<f64>, max: Option<f64> },
    String,
    Enum { values: Vec<Value> },
    ArrayOfRecord { key: Option<String> },
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Number | ValueKind::BoundedNumber { .. } => "number",
            ValueKind::String => "string",
            ValueKind::Enum { .. } => "enum",
            ValueKind::ArrayOfRecord { .. } => "array of records",
        }
    }

    /// Shape check only. `null` is treated as an absent value and accepted;
    /// bounds and enum membership belong to validators.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::Number | ValueKind::BoundedNumber { .. } => value.is_number(),
            ValueKind::String => value.is_string(),
            ValueKind::Enum { .. } => value.is_string() || value.is_number() || value.is_boolean(),
            ValueKind::ArrayOfRecord { .. } => value
                .as_array()
                .map(|items| items.iter().all(Value::is_object))
                .unwrap_or(false),
        }
    }

    /// Identifying field for array-of-record kinds.
    pub fn record_key(&self) -> Option<&str> {
        match self {
            ValueKind::ArrayOfRecord { key } => key.as_deref(),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, ValueKind::ArrayOfRecord { .. })
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `null` and the empty string count as "no value".
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_passes_every_kind() {
        for kind in [
            ValueKind::Boolean,
            ValueKind::String,
            ValueKind::ArrayOfRecord { key: None },
        ] {
            assert!(kind.accepts(&Value::Null));
        }
    }

    #[test]
    fn arrays_of_records_reject_scalar_items() {
        let kind = ValueKind::ArrayOfRecord {
            key: Some("id".into()),
        };
        assert!(kind.accepts(&json!([{ "id": "a" }])));
        assert!(!kind.accepts(&json!([{ "id": "a" }, 3])));
        assert!(!kind.accepts(&json!({ "id": "a" })));
        assert_eq!(kind.record_key(), Some("id"));
    }
}
