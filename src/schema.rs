//! Import schemas: the description of how spreadsheet columns map to record
//! fields.
//!
//! A [`Schema`] names a record type and owns an ordered list of
//! [`FieldDescriptor`]s, one per importable column. Descriptors may point at
//! a nested schema for embedded records; nested fields share the flat column
//! namespace of the row they come from.
//!
//! Schemas are built once at setup time through [`SchemaBuilder`] and are
//! immutable during import. All options are explicit setter methods resolved
//! at compile time.
//!
//! # Example
//!
//! ```
//! use sheetload::schema::{FieldDescriptor, Schema};
//!
//! let address = Schema::builder("Address")
//!     .field(FieldDescriptor::new("City"))
//!     .field(FieldDescriptor::new("Country"))
//!     .build();
//!
//! let user = Schema::builder("User")
//!     .field(FieldDescriptor::new("Name"))
//!     .field(FieldDescriptor::new("Languages").with_multi_delimiter(","))
//!     .field(FieldDescriptor::new("Address").with_nested(address))
//!     .build();
//!
//! assert_eq!(user.fields().len(), 3);
//! ```

use std::sync::Arc;

/// Metadata for one importable column.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    label: String,
    multi_delimiter: Option<String>,
    sequential_columns: bool,
    nested: Option<Arc<Schema>>,
}

impl FieldDescriptor {
    /// A plain scalar field whose label matches a spreadsheet header.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            multi_delimiter: None,
            sequential_columns: false,
            nested: None,
        }
    }

    /// Split the cell on this delimiter into a multi-value field.
    pub fn with_multi_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.multi_delimiter = Some(delimiter.into());
        self
    }

    /// This label appears as a contiguous run of same-named columns; the run
    /// collapses into a single multi-value field.
    pub fn with_sequential_columns(mut self) -> Self {
        self.sequential_columns = true;
        self
    }

    /// Delegate value extraction to a nested schema (embedded record).
    pub fn with_nested(mut self, schema: impl Into<Arc<Schema>>) -> Self {
        self.nested = Some(schema.into());
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn multi_delimiter(&self) -> Option<&str> {
        self.multi_delimiter.as_deref()
    }

    pub fn sequential_columns(&self) -> bool {
        self.sequential_columns
    }

    pub fn nested(&self) -> Option<&Arc<Schema>> {
        self.nested.as_ref()
    }
}

/// A named record type plus its ordered field descriptors.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder { name: name.into(), fields: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

/// Builder for [`Schema`]. Field order is registration order and drives the
/// order of extracted values.
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl SchemaBuilder {
    /// Register a field descriptor.
    ///
    /// # Panics
    ///
    /// Labels must be unique within a schema; registering the same label
    /// twice panics. A repeated header in the sheet itself is expressed with
    /// [`FieldDescriptor::with_sequential_columns`], not by registering the
    /// descriptor twice.
    pub fn field(mut self, descriptor: FieldDescriptor) -> Self {
        assert!(
            !self.fields.iter().any(|f| f.label == descriptor.label),
            "duplicate field label '{}' in schema '{}'",
            descriptor.label,
            self.name
        );
        self.fields.push(descriptor);
        self
    }

    pub fn build(self) -> Schema {
        Schema { name: self.name, fields: self.fields }
    }
}
