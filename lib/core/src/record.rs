use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Reference to a row of a source table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordRef {
    pub table: String,
    pub row: usize,
}

impl RecordRef {
    #[inline]
    #[must_use]
    pub fn new(table: impl Into<String>, row: usize) -> Self {
        Self {
            table: table.into(),
            row,
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.table, self.row)
    }
}

/// A raw row as handed out by a column store, fields in column order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    fields: Vec<(String, Option<String>)>,
}

impl Row {
    #[must_use]
    pub fn new(fields: Vec<(String, Option<String>)>) -> Self {
        Self { fields }
    }

    /// Build a row from a JSON object, fields in document order. Scalars
    /// are stringified, null and nested values become missing fields.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let fields = object
            .iter()
            .map(|(k, v)| {
                let cell = match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                };
                (k.clone(), cell)
            })
            .collect();
        Some(Self { fields })
    }

    /// Value of a column, `None` when absent or null
    #[inline]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, v)| v.as_deref())
    }

    #[inline]
    pub fn has_column(&self, column: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// An immutable record selected for matching.
///
/// `combined_text` is the lower-cased, space-joined value of the selected
/// columns, computed once when the record is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub reference: RecordRef,
    fields: Vec<(String, String)>,
    combined_text: String,
}

impl Record {
    /// Build a record from the selected `(column, value)` pairs
    #[must_use]
    pub fn new(reference: RecordRef, fields: Vec<(String, String)>) -> Self {
        let combined_text = fields
            .iter()
            .map(|(_, v)| v.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_lowercase();
        Self {
            reference,
            fields,
            combined_text,
        }
    }

    #[inline]
    #[must_use]
    pub fn combined_text(&self) -> &str {
        &self.combined_text
    }

    #[inline]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    #[inline]
    pub fn field(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_combined_text_is_lowercased_and_cached() {
        let record = Record::new(
            RecordRef::new("customers", 3),
            vec![
                ("name".to_string(), "PT Sumber Makmur".to_string()),
                ("city".to_string(), "Jakarta".to_string()),
            ],
        );
        assert_eq!(record.combined_text(), "pt sumber makmur jakarta");
        assert_eq!(record.field("city"), Some("Jakarta"));
        assert_eq!(record.reference.to_string(), "customers#3");
    }

    #[test]
    fn test_row_from_json() {
        let row = Row::from_json(&json!({"name": "Toko", "zip": 12345, "note": null})).unwrap();
        assert_eq!(row.get("name"), Some("Toko"));
        assert_eq!(row.get("zip"), Some("12345"));
        assert_eq!(row.get("note"), None);
        assert!(row.has_column("note"));
        assert!(Row::from_json(&json!([1, 2])).is_none());
    }

    #[test]
    fn test_row_from_json_keeps_document_order() {
        let row: Row = Row::from_json(&serde_json::from_str(r#"{"zeta": "z", "alpha": "a", "mid": 1}"#).unwrap()).unwrap();
        let columns: Vec<&str> = row.columns().collect();
        assert_eq!(columns, vec!["zeta", "alpha", "mid"]);
    }
}
