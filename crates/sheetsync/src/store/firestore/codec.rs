//! 🔁 Firestore typed-JSON codec.
//!
//! Firestore's REST API wraps every value in a one-key object naming its type:
//! `{"stringValue": "x"}`, `{"doubleValue": 1.5}`, `{"mapValue": {"fields": {...}}}`.
//! This module translates between that and [`FieldValue`].

use serde_json::{Map, Value, json};
use tracing::trace;

use crate::common::{FieldValue, Fields};

pub(crate) fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Bool(flag) => json!({ "booleanValue": flag }),
        FieldValue::Number(number) => json!({ "doubleValue": number }),
        FieldValue::Text(text) => json!({ "stringValue": text }),
        FieldValue::Timestamp(stamp) => json!({ "timestampValue": stamp }),
        FieldValue::Map(members) => json!({ "mapValue": { "fields": encode_fields(members) } }),
    }
}

pub(crate) fn encode_fields(fields: &Fields) -> Value {
    let encoded: Map<String, Value> = fields
        .iter()
        .map(|(name, value)| (name.clone(), encode_value(value)))
        .collect();
    Value::Object(encoded)
}

/// 🔓 Decodes one typed value. Kinds we never write (arrays, geo points,
/// bytes) come back as `Null`; references come back as their path text.
pub(crate) fn decode_value(value: &Value) -> FieldValue {
    let Some(object) = value.as_object() else {
        return FieldValue::Null;
    };
    let Some((kind, inner)) = object.iter().next() else {
        return FieldValue::Null;
    };
    match kind.as_str() {
        "nullValue" => FieldValue::Null,
        "booleanValue" => inner.as_bool().map(FieldValue::Bool).unwrap_or(FieldValue::Null),
        // -- 64-bit ints arrive as JSON strings, because JavaScript
        "integerValue" => inner
            .as_str()
            .and_then(|text| text.parse::<i64>().ok())
            .or_else(|| inner.as_i64())
            .map(|number| FieldValue::Number(number as f64))
            .unwrap_or(FieldValue::Null),
        "doubleValue" => inner
            .as_f64()
            .map(FieldValue::Number)
            .unwrap_or(FieldValue::Null),
        "stringValue" | "referenceValue" => inner
            .as_str()
            .map(|text| FieldValue::Text(text.to_string()))
            .unwrap_or(FieldValue::Null),
        "timestampValue" => inner
            .as_str()
            .map(|stamp| FieldValue::Timestamp(stamp.to_string()))
            .unwrap_or(FieldValue::Null),
        "mapValue" => FieldValue::Map(decode_fields(inner.get("fields"))),
        other => {
            trace!("🤷 Firestore value kind {other} has no local counterpart, reading as null");
            FieldValue::Null
        }
    }
}

pub(crate) fn decode_fields(fields: Option<&Value>) -> Fields {
    fields
        .and_then(Value::as_object)
        .map(|object| {
            object
                .iter()
                .map(|(name, value)| (name.clone(), decode_value(value)))
                .collect()
        })
        .unwrap_or_default()
}

/// 🏷️ Field paths that are not plain identifiers must be backtick-quoted.
pub(crate) fn quote_field_path(field: &str) -> String {
    let simple = field
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        field.to_string()
    } else {
        format!("`{}`", field.replace('\\', "\\\\").replace('`', "\\`"))
    }
}
