//! # Sheetload - transactional spreadsheet batch import
//!
//! Sheetload ingests a tabular spreadsheet upload, maps each row to a
//! structured record through a field schema, validates and persists every
//! record concurrently, and commits or rolls back the whole batch as one
//! transaction while streaming per-row outcomes to the caller.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Upload    │────▶│  Decoder +  │────▶│ Worker Pool │────▶│ Commit /    │
//! │  (stream)   │     │ Preprocess  │     │ (map·valid· │     │ Rollback    │
//! └─────────────┘     └─────────────┘     │  persist)   │     └─────────────┘
//!                                         └──────┬──────┘
//!                                                ▼
//!                                          status stream
//!                                        (one RowOutcome/row)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sheetload::{FieldDescriptor, Importer, JsonRecordProcessor, MemoryStore, Schema};
//!
//! #[tokio::main]
//! async fn main() {
//!     let schema = Schema::builder("User")
//!         .field(FieldDescriptor::new("name"))
//!         .field(FieldDescriptor::new("age"))
//!         .build();
//!
//!     let importer = Importer::new(schema, JsonRecordProcessor::new(), MemoryStore::new());
//!     let (progress, status) = importer.import(upload_stream).await.unwrap();
//!
//!     for outcome in status.drain().await {
//!         println!("{}:{} -> {} error(s)", outcome.sheet, outcome.line, outcome.errors.len());
//!     }
//!     progress.wait().await.unwrap();
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`schema`] - Schemas and field descriptors
//! - [`sheet`] - Workbook model and spreadsheet decoders
//! - [`preprocess`] - Empty sheet/row stripping and row accounting
//! - [`mapper`] - Row to field-value-set mapping
//! - [`record`] - Processor and store collaborator seams
//! - [`pipeline`] - Orchestrator, worker pool, progress signaling
//! - [`processors`] - Built-in JSON processor and stores

// Core modules
pub mod error;
pub mod schema;

// Decoding
pub mod sheet;

// Row preparation
pub mod mapper;
pub mod preprocess;

// Collaborator seams
pub mod record;

// Pipeline
pub mod pipeline;

// Built-in collaborators
pub mod processors;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ImportError, ImportResult, RowError, SheetError, SheetResult, TransactionError};

// =============================================================================
// Re-exports - Schema
// =============================================================================

pub use schema::{FieldDescriptor, Schema, SchemaBuilder};

// =============================================================================
// Re-exports - Sheets
// =============================================================================

pub use sheet::{CsvDecoder, Sheet, SheetDecoder, Workbook};

// =============================================================================
// Re-exports - Mapping
// =============================================================================

pub use mapper::{map_row, FieldValue, FieldValueSet, RowMap};
pub use preprocess::preprocess;

// =============================================================================
// Re-exports - Collaborator seams
// =============================================================================

pub use record::{RecordProcessor, Store, Transaction};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{BatchProgress, ImportOptions, Importer, RowOutcome, StatusStream};

// =============================================================================
// Re-exports - Built-in processors
// =============================================================================

pub use processors::{JsonFileStore, JsonRecordProcessor, JsonTransaction, MemoryStore};
