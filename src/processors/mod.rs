//! Ready-made collaborators for the import pipeline.
//!
//! The pipeline itself only knows the [`RecordProcessor`](crate::record::RecordProcessor)
//! and [`Store`](crate::record::Store) seams; this module ships one concrete
//! pair that treats records as JSON objects.

pub mod json;

pub use json::{JsonFileStore, JsonRecordProcessor, JsonTransaction, MemoryStore};
