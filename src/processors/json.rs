//! JSON record processing and storage.
//!
//! [`JsonRecordProcessor`] decodes a row's field values into a
//! `serde_json::Value` object (nested field sets become nested objects,
//! multi-values become arrays) and optionally validates it against a JSON
//! Schema (Draft 7), collecting every violation rather than stopping at the
//! first.
//!
//! Two stores share the same [`JsonTransaction`]: [`MemoryStore`] commits
//! into a shared in-memory vector (handy for tests and previews), and
//! [`JsonFileStore`] commits the batch to a JSON file via write-to-temp plus
//! atomic rename. In both, persisted rows are only staged inside the
//! transaction; rollback discards the staging buffer, so a rolled-back batch
//! leaves nothing observable.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::{RowError, TransactionError};
use crate::mapper::{FieldValue, FieldValueSet};
use crate::record::{RecordProcessor, Store, Transaction};

// =============================================================================
// Processor
// =============================================================================

/// Decodes field value sets into JSON objects, with optional JSON Schema
/// validation.
#[derive(Debug, Clone, Default)]
pub struct JsonRecordProcessor {
    schema: Option<Value>,
}

impl JsonRecordProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate decoded records against a JSON Schema (Draft 7).
    pub fn with_validation(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    fn to_object(values: &FieldValueSet) -> Value {
        let mut obj = Map::new();
        for entry in values.iter() {
            let value = match &entry.value {
                FieldValue::Absent => continue,
                FieldValue::Scalar(s) => Value::String(s.clone()),
                FieldValue::Multi(items) => {
                    Value::Array(items.iter().cloned().map(Value::String).collect())
                }
                FieldValue::Nested(set) => Self::to_object(set),
            };
            obj.insert(entry.label.clone(), value);
        }
        Value::Object(obj)
    }
}

#[async_trait]
impl RecordProcessor for JsonRecordProcessor {
    type Record = Value;
    type Tx = JsonTransaction;

    async fn decode(&self, values: &FieldValueSet) -> Result<Value, Vec<RowError>> {
        Ok(Self::to_object(values))
    }

    async fn initialize(&self, _record: &mut Value) -> Result<(), RowError> {
        // JSON records have no backing row to look up; the import creates
        // them, which is the tolerated condition.
        Err(RowError::RecordNotFound)
    }

    async fn validate(&self, record: &Value) -> Vec<RowError> {
        let Some(schema) = &self.schema else {
            return vec![];
        };

        let validator = match jsonschema::draft7::new(schema) {
            Ok(validator) => validator,
            Err(err) => {
                return vec![RowError::validation("$schema", err.to_string())];
            }
        };

        validator
            .iter_errors(record)
            .map(|err| {
                let path = err.instance_path().to_string();
                let field = if path.is_empty() { "$".to_string() } else { path };
                RowError::validation(field, err.to_string())
            })
            .collect()
    }

    async fn persist(&self, record: Value, tx: &JsonTransaction) -> Result<(), RowError> {
        tx.stage(record).await;
        Ok(())
    }
}

// =============================================================================
// Transaction
// =============================================================================

#[derive(Debug)]
enum CommitSink {
    Memory(Arc<Mutex<Vec<Value>>>),
    File(PathBuf),
}

/// Staging transaction shared by the JSON stores.
///
/// Persist calls stage rows behind a mutex (safe for concurrent workers);
/// nothing reaches the sink before `commit`.
#[derive(Debug)]
pub struct JsonTransaction {
    staged: Mutex<Vec<Value>>,
    sink: CommitSink,
}

impl JsonTransaction {
    pub async fn stage(&self, record: Value) {
        self.staged.lock().await.push(record);
    }

    pub async fn staged_len(&self) -> usize {
        self.staged.lock().await.len()
    }
}

#[async_trait]
impl Transaction for JsonTransaction {
    async fn commit(&self) -> Result<(), TransactionError> {
        let staged = std::mem::take(&mut *self.staged.lock().await);
        match &self.sink {
            CommitSink::Memory(records) => {
                records.lock().await.extend(staged);
                Ok(())
            }
            CommitSink::File(path) => write_atomically(path, &staged)
                .map_err(|e| TransactionError::Commit(e.to_string())),
        }
    }

    async fn rollback(&self) -> Result<(), TransactionError> {
        self.staged.lock().await.clear();
        Ok(())
    }
}

/// Write the batch next to its destination and rename into place, so a crash
/// mid-write never leaves a half-written file.
fn write_atomically(path: &PathBuf, records: &[Value]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let mut staging = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut staging, records)?;
    staging.write_all(b"\n")?;
    staging.flush()?;
    staging.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// =============================================================================
// Stores
// =============================================================================

/// Commits batches into a shared in-memory vector.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on the committed records, observable across the import.
    pub fn records(&self) -> Arc<Mutex<Vec<Value>>> {
        Arc::clone(&self.records)
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = JsonTransaction;

    async fn begin(&self) -> Result<JsonTransaction, TransactionError> {
        Ok(JsonTransaction {
            staged: Mutex::new(Vec::new()),
            sink: CommitSink::Memory(Arc::clone(&self.records)),
        })
    }
}

/// Commits batches to a JSON file, atomically.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Store for JsonFileStore {
    type Tx = JsonTransaction;

    async fn begin(&self) -> Result<JsonTransaction, TransactionError> {
        Ok(JsonTransaction {
            staged: Mutex::new(Vec::new()),
            sink: CommitSink::File(self.path.clone()),
        })
    }
}
