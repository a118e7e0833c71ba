//! Error types for the sheetload import pipeline.
//!
//! This module defines a hierarchy of error types following best practices:
//!
//! - [`SheetError`] - spreadsheet decoding errors
//! - [`RowError`] - per-row decode/validation/persistence errors
//! - [`TransactionError`] - storage transaction errors
//! - [`ImportError`] - top-level batch orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Row errors never cross the worker boundary as `Err` values: they are
//! collected on the row's [`RowOutcome`](crate::pipeline::RowOutcome) and
//! published on the status stream. Only batch-level errors travel on the
//! [`BatchProgress`](crate::pipeline::BatchProgress) error channel.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Spreadsheet Decoding Errors
// =============================================================================

/// Errors while decoding an uploaded spreadsheet into sheets of rows.
#[derive(Debug, Error)]
pub enum SheetError {
    /// Failed to read the staged file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to detect or apply a text encoding.
    #[error("Failed to decode text: {0}")]
    Encoding(String),

    /// The file is not a spreadsheet this decoder understands.
    #[error("Invalid spreadsheet format: {0}")]
    Parse(String),

    /// Empty file.
    #[error("Spreadsheet file is empty")]
    EmptyFile,

    /// No header row found.
    #[error("No headers found in sheet")]
    NoHeaders,
}

// =============================================================================
// Row Errors
// =============================================================================

/// Errors raised while processing a single row.
///
/// Serializable so a [`RowOutcome`](crate::pipeline::RowOutcome) can be
/// rendered into a line-by-line report. Several of these may accumulate on
/// one row (validation collects every failure, not just the first).
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum RowError {
    /// The field values could not be decoded into a record.
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Record initialization failed.
    #[error("Initialize error: {message}")]
    Initialize { message: String },

    /// The record targeted by this row does not exist yet.
    ///
    /// Tolerated during initialization (the import creates it); any other
    /// stage reporting it treats it as a real failure.
    #[error("Record not found")]
    RecordNotFound,

    /// A field failed validation.
    #[error("Validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    /// Persisting the record through the batch transaction failed.
    #[error("Persist error: {message}")]
    Persist { message: String },
}

impl RowError {
    pub fn decode(message: impl Into<String>) -> Self {
        RowError::Decode { message: message.into() }
    }

    pub fn initialize(message: impl Into<String>) -> Self {
        RowError::Initialize { message: message.into() }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        RowError::Validation { field: field.into(), message: message.into() }
    }

    pub fn persist(message: impl Into<String>) -> Self {
        RowError::Persist { message: message.into() }
    }
}

// =============================================================================
// Transaction Errors
// =============================================================================

/// Errors from the storage collaborator's transaction handle.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Could not open the batch transaction.
    #[error("Failed to begin transaction: {0}")]
    Begin(String),

    /// Commit failed; the batch outcome is undefined on the storage side.
    #[error("Failed to commit transaction: {0}")]
    Commit(String),

    /// Rollback failed; rows persisted before the failure may survive.
    #[error("Failed to roll back transaction: {0}")]
    Rollback(String),
}

// =============================================================================
// Import Errors (top-level)
// =============================================================================

/// Top-level batch import errors.
///
/// This is the error type delivered on the
/// [`BatchProgress`](crate::pipeline::BatchProgress) error channel, and the
/// immediate error type of [`Importer::import`](crate::pipeline::Importer::import)
/// for failures before any row is processed.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The upload could not be staged to temporary storage.
    #[error("Failed to stage upload: {0}")]
    Io(#[from] std::io::Error),

    /// The staged file could not be decoded as a spreadsheet.
    #[error("Spreadsheet error: {0}")]
    Format(#[from] SheetError),

    /// Opening the batch transaction failed.
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// Commit failed after a clean run.
    #[error("Commit failed: {0}")]
    Commit(#[source] TransactionError),

    /// Rollback failed after a failed run.
    ///
    /// Reported instead of [`ImportError::BatchFailed`] so callers can tell a
    /// dirty rollback apart from an ordinary failed batch.
    #[error("Rollback failed: {0}")]
    Rollback(#[source] TransactionError),

    /// At least one row failed; the batch was rolled back.
    #[error("Batch failed: one or more rows could not be imported")]
    BatchFailed,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for spreadsheet decoding.
pub type SheetResult<T> = Result<T, SheetError>;

/// Result type for batch import operations.
pub type ImportResult<T> = Result<T, ImportError>;
