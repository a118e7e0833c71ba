//! Collaborator seams: record processing and transactional storage.
//!
//! The pipeline owns scheduling and signaling; everything record-shaped is
//! delegated through these traits. A [`RecordProcessor`] carries a row from
//! decoded field values all the way to a persisted record; a [`Store`] hands
//! out the single [`Transaction`] every persist of a batch writes through.

use async_trait::async_trait;

use crate::error::{RowError, TransactionError};
use crate::mapper::FieldValueSet;

/// The batch transaction handle shared by every row worker.
///
/// `commit`/`rollback` are called exactly once, after all submitted rows have
/// drained, so neither races a persist. Persist calls do run concurrently:
/// implementations must either tolerate concurrent writes within one
/// transaction or serialize them internally (e.g. behind a mutex). Rollback
/// is expected to undo every persist issued through this handle.
#[async_trait]
pub trait Transaction: Send + Sync {
    async fn commit(&self) -> Result<(), TransactionError>;
    async fn rollback(&self) -> Result<(), TransactionError>;
}

/// Transactional storage: opens the one transaction that spans a batch.
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: Transaction + 'static;

    async fn begin(&self) -> Result<Self::Tx, TransactionError>;
}

/// Decodes, initializes, validates and persists one record per row.
///
/// Stages run in order and the first failing stage ends that row's
/// processing; its errors land on the row's outcome, never as a panic or an
/// early return from the pipeline. `validate` reports every failure it finds,
/// not just the first.
#[async_trait]
pub trait RecordProcessor: Send + Sync {
    type Record: Send;
    type Tx: Transaction + 'static;

    /// Build a record from one row's field values.
    async fn decode(&self, values: &FieldValueSet) -> Result<Self::Record, Vec<RowError>>;

    /// Prepare the record (lookups, defaults). Returning
    /// [`RowError::RecordNotFound`] is tolerated by the pipeline: the import
    /// is how the record comes to exist.
    async fn initialize(&self, record: &mut Self::Record) -> Result<(), RowError>;

    /// Collect all validation failures for the record.
    async fn validate(&self, record: &Self::Record) -> Vec<RowError>;

    /// Write the record through the shared batch transaction.
    async fn persist(&self, record: Self::Record, tx: &Self::Tx) -> Result<(), RowError>;
}
