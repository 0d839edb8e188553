//! 📦 Common data structures, the building blocks of sheetsync.
//!
//! 🎬 COLD OPEN: a spreadsheet cell arrives. It might be a number. It might be
//! the string `"1.234,56"`. It might be `#REF!`. It does not know what it is,
//! and honestly, neither does the back-office that exported it.
//!
//! This module defines the humble yet load-bearing types that ferry data from
//! the sheet to the store:
//! - [`CellValue`]: whatever a source reader found in a cell, untouched.
//! - [`FieldValue`]: a normalized scalar or nested group, ready to be stored.
//! - [`Record`]: a canonical record keyed by its business code.
//! - [`Document`]: what the store hands back when we ask "what do you have?".
//!
//! 🦆

use std::collections::BTreeMap;

use serde::Serialize;

/// 🧾 A raw spreadsheet cell, exactly as the reader decoded it.
///
/// Delimited sources only ever produce `Text` and `Empty`. Workbooks can also
/// produce `Number` and `Bool`. Image formulas arrive as `Text("=IMAGE(...)")`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// 🕳️ True for empty cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            CellValue::Number(_) | CellValue::Bool(_) => false,
        }
    }

    /// 🔤 Renders the cell as text the way a human would read it off the sheet.
    ///
    /// Whole numbers drop their `.0` because product code `1042` is not `1042.0`,
    /// no matter what the float says.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(text) => text.clone(),
            CellValue::Number(number) => {
                if number.fract() == 0.0 && number.abs() < 1e15 {
                    format!("{}", *number as i64)
                } else {
                    number.to_string()
                }
            }
            CellValue::Bool(flag) => flag.to_string(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(text: &str) -> Self {
        CellValue::Text(text.to_string())
    }
}

/// 💎 A normalized value as it is stored in a document.
///
/// Equality is structural: two `Map`s are equal when their members are equal,
/// which is exactly what the diff in the upsert engine needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    /// ⏱️ A timestamp read back from the store (RFC 3339). We never write these
    /// directly: server timestamps are requested through write transforms.
    Timestamp(String),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(number) => Some(*number),
            _ => None,
        }
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map(FieldValue::Text).unwrap_or(FieldValue::Null)
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        value.map(FieldValue::Number).unwrap_or(FieldValue::Null)
    }
}

/// 🗂️ The fields of a document, ordered so diffs and payloads are deterministic.
pub type Fields = BTreeMap<String, FieldValue>;

/// 🎯 A canonical record: one logical entity, one business key, one destiny.
///
/// The `key` doubles as the destination document id. That is the whole reason
/// re-running an import never duplicates anything.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub key: String,
    pub fields: Fields,
}

impl Record {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: Fields::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }
}

/// 📄 A document as the store returns it: id plus whatever fields it holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    /// 🧭 Follows a dotted path (`contact.salesman`) through nested maps.
    ///
    /// A literal top-level field named with dots wins over the nested walk,
    /// because some sheets really do have a column called `"sales.rep"`.
    pub fn lookup_path(&self, path: &str) -> Option<&FieldValue> {
        if let Some(value) = self.fields.get(path) {
            return Some(value);
        }
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;
        for segment in segments {
            match current {
                FieldValue::Map(members) => current = members.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_whole_numbers_lose_their_decimal_dignity() {
        assert_eq!(CellValue::Number(1042.0).as_text(), "1042");
        assert_eq!(CellValue::Number(12.5).as_text(), "12.5");
        assert_eq!(CellValue::Bool(true).as_text(), "true");
        assert_eq!(CellValue::Empty.as_text(), "");
    }

    #[test]
    fn the_one_where_blank_means_whitespace_too() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::from("   ").is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
        assert!(!CellValue::from("0").is_blank());
    }

    #[test]
    fn the_one_where_dotted_paths_walk_into_nested_maps() {
        let mut contact = Fields::new();
        contact.insert("salesman".into(), FieldValue::Text("Nikos".into()));
        let mut fields = Fields::new();
        fields.insert("contact".into(), FieldValue::Map(contact));
        fields.insert("sales.rep".into(), FieldValue::Text("Literal".into()));
        let doc = Document {
            id: "C1".into(),
            fields,
        };

        assert_eq!(
            doc.lookup_path("contact.salesman"),
            Some(&FieldValue::Text("Nikos".into()))
        );
        assert_eq!(
            doc.lookup_path("sales.rep"),
            Some(&FieldValue::Text("Literal".into()))
        );
        assert_eq!(doc.lookup_path("contact.missing"), None);
        assert_eq!(doc.lookup_path("sales.rep.deeper"), None);
    }

    #[test]
    fn the_one_where_nested_maps_compare_by_value_not_by_address() {
        let mut left = Fields::new();
        left.insert("city".into(), FieldValue::Text("Patra".into()));
        left.insert("zip".into(), FieldValue::Null);
        let right = left.clone();
        assert_eq!(FieldValue::Map(left), FieldValue::Map(right));
    }
}
