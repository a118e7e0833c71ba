//! The field mapper: one raw spreadsheet row into a hierarchical
//! [`FieldValueSet`] shaped like its [`Schema`](crate::schema::Schema).
//!
//! Mapping consumes the row: a descriptor that claims a header removes it
//! from the [`RowMap`], so sibling descriptors (including those inside nested
//! schemas, which share the same flat column namespace) cannot re-claim it.
//! Headers the schema never asks for simply stay behind; descriptors the row
//! cannot satisfy come out [`FieldValue::Absent`] rather than failing.
//!
//! Deterministic: output order is descriptor registration order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::schema::Schema;

// =============================================================================
// Field Values
// =============================================================================

/// The value extracted for one field descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// No matching header in the row.
    Absent,
    /// A single cell text (possibly empty).
    Scalar(String),
    /// A multi-valued cell (delimiter split) or a sequential column run.
    Multi(Vec<String>),
    /// An embedded record extracted by a nested schema.
    Nested(FieldValueSet),
}

impl FieldValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_multi(&self) -> Option<&[String]> {
        match self {
            FieldValue::Multi(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_nested(&self) -> Option<&FieldValueSet> {
        match self {
            FieldValue::Nested(set) => Some(set),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }
}

/// One labeled value in a [`FieldValueSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub label: String,
    pub value: FieldValue,
}

/// Ordered label→value mapping for one row, mirroring its schema's nesting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldValueSet {
    entries: Vec<FieldEntry>,
}

impl FieldValueSet {
    pub fn get(&self, label: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| &e.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, label: impl Into<String>, value: FieldValue) {
        self.entries.push(FieldEntry { label: label.into(), value });
    }
}

// =============================================================================
// Row Map
// =============================================================================

/// Header→cell-texts mapping for one raw row.
///
/// Duplicate headers accumulate their cells in column order, which is what
/// lets a sequential-columns descriptor claim the whole run at once.
#[derive(Debug, Clone, Default)]
pub struct RowMap {
    cells: HashMap<String, Vec<String>>,
}

impl RowMap {
    /// Pair up header labels and cell texts. Cells past the last header are
    /// dropped; headers past the last cell map to empty text.
    pub fn from_row(headers: &[String], cells: &[String]) -> Self {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            let cell = cells.get(i).cloned().unwrap_or_default();
            map.entry(header.clone()).or_default().push(cell);
        }
        Self { cells: map }
    }

    /// Claim every cell recorded under a label.
    pub fn take(&mut self, label: &str) -> Option<Vec<String>> {
        self.cells.remove(label)
    }

    /// Headers not yet claimed by any descriptor.
    pub fn remaining(&self) -> usize {
        self.cells.len()
    }
}

// =============================================================================
// Mapping
// =============================================================================

/// Extract a [`FieldValueSet`] for `schema` from `row`, consuming matched
/// entries.
///
/// Nested descriptors recurse against the same partially consumed map.
pub fn map_row(schema: &Schema, row: &mut RowMap) -> FieldValueSet {
    let mut set = FieldValueSet::default();

    for field in schema.fields() {
        if let Some(nested) = field.nested() {
            let inner = map_row(nested, row);
            set.push(field.label(), FieldValue::Nested(inner));
            continue;
        }

        let value = match row.take(field.label()) {
            None => FieldValue::Absent,
            Some(cells) => {
                let cells: Vec<String> = if field.sequential_columns() {
                    cells
                } else {
                    // Single-header field: the first cell wins.
                    cells.into_iter().take(1).collect()
                };

                match field.multi_delimiter() {
                    Some(delim) => FieldValue::Multi(
                        cells
                            .iter()
                            .flat_map(|c| c.split(delim))
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect(),
                    ),
                    None if field.sequential_columns() => FieldValue::Multi(cells),
                    None => FieldValue::Scalar(cells.into_iter().next().unwrap_or_default()),
                }
            }
        };

        set.push(field.label(), value);
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDescriptor;

    fn row(pairs: &[(&str, &str)]) -> RowMap {
        let headers: Vec<String> = pairs.iter().map(|(h, _)| h.to_string()).collect();
        let cells: Vec<String> = pairs.iter().map(|(_, c)| c.to_string()).collect();
        RowMap::from_row(&headers, &cells)
    }

    #[test]
    fn test_flat_mapping() {
        let schema = Schema::builder("User")
            .field(FieldDescriptor::new("Name"))
            .field(FieldDescriptor::new("Age"))
            .build();
        let mut map = row(&[("Name", "Ann"), ("Age", "30")]);

        let set = map_row(&schema, &mut map);

        assert_eq!(set.get("Name").unwrap().as_scalar(), Some("Ann"));
        assert_eq!(set.get("Age").unwrap().as_scalar(), Some("30"));
        assert_eq!(map.remaining(), 0);
    }

    #[test]
    fn test_nested_schema_shares_flat_namespace() {
        let address = Schema::builder("Address")
            .field(FieldDescriptor::new("City"))
            .build();
        let schema = Schema::builder("User")
            .field(FieldDescriptor::new("Name"))
            .field(FieldDescriptor::new("Address").with_nested(address))
            .build();
        let mut map = row(&[("Name", "Ann"), ("City", "Oslo")]);

        let set = map_row(&schema, &mut map);

        assert_eq!(set.get("Name").unwrap().as_scalar(), Some("Ann"));
        let nested = set.get("Address").unwrap().as_nested().unwrap();
        assert_eq!(nested.get("City").unwrap().as_scalar(), Some("Oslo"));
        assert_eq!(map.remaining(), 0);
    }

    #[test]
    fn test_consumed_entry_not_reclaimed() {
        let nested = Schema::builder("Inner")
            .field(FieldDescriptor::new("Name"))
            .build();
        let schema = Schema::builder("Outer")
            .field(FieldDescriptor::new("Name"))
            .field(FieldDescriptor::new("Inner").with_nested(nested))
            .build();
        let mut map = row(&[("Name", "once")]);

        let set = map_row(&schema, &mut map);

        assert_eq!(set.get("Name").unwrap().as_scalar(), Some("once"));
        let inner = set.get("Inner").unwrap().as_nested().unwrap();
        assert!(inner.get("Name").unwrap().is_absent());
    }

    #[test]
    fn test_unmatched_descriptor_is_absent() {
        let schema = Schema::builder("User")
            .field(FieldDescriptor::new("Name"))
            .field(FieldDescriptor::new("Email"))
            .build();
        let mut map = row(&[("Name", "Ann")]);

        let set = map_row(&schema, &mut map);

        assert!(set.get("Email").unwrap().is_absent());
    }

    #[test]
    fn test_multi_delimiter_split() {
        let schema = Schema::builder("User")
            .field(FieldDescriptor::new("Languages").with_multi_delimiter(","))
            .build();
        let mut map = row(&[("Languages", "en, no ,fr")]);

        let set = map_row(&schema, &mut map);

        assert_eq!(
            set.get("Languages").unwrap().as_multi(),
            Some(&["en".to_string(), "no".to_string(), "fr".to_string()][..])
        );
    }

    #[test]
    fn test_sequential_columns_collapse() {
        let schema = Schema::builder("Quiz")
            .field(FieldDescriptor::new("Answer").with_sequential_columns())
            .build();
        let mut map = row(&[("Answer", "a"), ("Answer", "b"), ("Answer", "c")]);

        let set = map_row(&schema, &mut map);

        assert_eq!(
            set.get("Answer").unwrap().as_multi(),
            Some(&["a".to_string(), "b".to_string(), "c".to_string()][..])
        );
    }

    #[test]
    fn test_duplicate_header_without_sequential_takes_first() {
        let schema = Schema::builder("T")
            .field(FieldDescriptor::new("X"))
            .build();
        let mut map = row(&[("X", "first"), ("X", "second")]);

        let set = map_row(&schema, &mut map);

        assert_eq!(set.get("X").unwrap().as_scalar(), Some("first"));
    }

    #[test]
    fn test_missing_cells_map_to_empty() {
        let headers: Vec<String> = vec!["a".into(), "b".into()];
        let cells: Vec<String> = vec!["1".into()];
        let mut map = RowMap::from_row(&headers, &cells);

        let schema = Schema::builder("T")
            .field(FieldDescriptor::new("b"))
            .build();
        let set = map_row(&schema, &mut map);

        assert_eq!(set.get("b").unwrap().as_scalar(), Some(""));
    }

    #[test]
    fn test_deterministic_output_order() {
        let schema = Schema::builder("T")
            .field(FieldDescriptor::new("b"))
            .field(FieldDescriptor::new("a"))
            .build();
        let mut map = row(&[("a", "1"), ("b", "2")]);

        let set = map_row(&schema, &mut map);

        let labels: Vec<&str> = set.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "a"]);
    }
}
