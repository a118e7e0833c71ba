//! Batch progress signals and the per-row status stream.
//!
//! An import runs in the background; the caller observes it through two
//! one-shot signals (completion, error — exactly one fires per job) and a
//! bounded stream of [`RowOutcome`]s, one per submitted row, in completion
//! order, not row order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::error::{ImportError, ImportResult, RowError};
use crate::mapper::FieldValueSet;

/// Buffered outcomes before producers block.
pub(crate) const STATUS_BUFFER: usize = 10;

// =============================================================================
// Row Outcome
// =============================================================================

/// The result of processing one row.
#[derive(Debug, Clone, Serialize)]
pub struct RowOutcome {
    /// Sheet the row came from.
    pub sheet: String,
    /// 1-based data line number within the sheet (header excluded).
    pub line: usize,
    /// The field values the row mapped to.
    pub values: FieldValueSet,
    /// Errors from decode, validation or persistence; empty on success.
    pub errors: Vec<RowError>,
}

impl RowOutcome {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

// =============================================================================
// Batch Progress
// =============================================================================

/// The caller's handle on a running import.
///
/// Exactly one of the completion and error signals fires per job; [`wait`]
/// resolves whichever does.
///
/// [`wait`]: BatchProgress::wait
#[derive(Debug)]
pub struct BatchProgress {
    /// Identifies this import run in logs and reports.
    pub batch_id: Uuid,
    /// Total data rows the preprocessor counted; the upper bound on emitted
    /// outcomes.
    pub total_lines: usize,
    /// When the background job was launched.
    pub started_at: DateTime<Utc>,
    done: oneshot::Receiver<()>,
    error: oneshot::Receiver<ImportError>,
}

impl BatchProgress {
    /// Allocate the paired caller/job handles for one import run.
    pub(crate) fn channel(total_lines: usize) -> (Self, ProgressSignals) {
        let (done_tx, done_rx) = oneshot::channel();
        let (error_tx, error_rx) = oneshot::channel();
        let progress = Self {
            batch_id: Uuid::new_v4(),
            total_lines,
            started_at: Utc::now(),
            done: done_rx,
            error: error_rx,
        };
        (progress, ProgressSignals { done: done_tx, error: error_tx })
    }

    /// Block until the batch completes or fails.
    ///
    /// Drain the status stream concurrently or beforehand: workers block
    /// when its buffer fills, and the signals only fire once every worker
    /// has reported. If the background job dies without signaling (a
    /// panic), this reports the batch as failed rather than hanging.
    pub async fn wait(self) -> ImportResult<()> {
        let Self { done, error, .. } = self;
        // The job fires one signal and drops the other half, so the error
        // side always resolves: with the batch error, or closed on success.
        match error.await {
            Ok(err) => Err(err),
            Err(_) => match done.await {
                Ok(()) => Ok(()),
                Err(_) => Err(ImportError::BatchFailed),
            },
        }
    }
}

/// Job-side halves of the progress signals.
///
/// Consuming methods make double-signaling unrepresentable.
#[derive(Debug)]
pub(crate) struct ProgressSignals {
    done: oneshot::Sender<()>,
    error: oneshot::Sender<ImportError>,
}

impl ProgressSignals {
    pub(crate) fn complete(self) {
        let _ = self.done.send(());
    }

    pub(crate) fn fail(self, err: ImportError) {
        let _ = self.error.send(err);
    }
}

// =============================================================================
// Status Stream
// =============================================================================

/// Consumer end of the per-row outcome channel.
#[derive(Debug)]
pub struct StatusStream {
    rx: mpsc::Receiver<RowOutcome>,
}

impl StatusStream {
    pub(crate) fn channel() -> (mpsc::Sender<RowOutcome>, Self) {
        let (tx, rx) = mpsc::channel(STATUS_BUFFER);
        (tx, Self { rx })
    }

    /// Next outcome, or `None` once every submitted row has reported.
    pub async fn recv(&mut self) -> Option<RowOutcome> {
        self.rx.recv().await
    }

    /// Adapt into a [`futures::Stream`] for combinator-style consumption.
    pub fn into_stream(self) -> ReceiverStream<RowOutcome> {
        ReceiverStream::new(self.rx)
    }

    /// Collect every remaining outcome.
    pub async fn drain(mut self) -> Vec<RowOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.rx.recv().await {
            outcomes.push(outcome);
        }
        outcomes
    }
}
