//! The row worker pool and the transaction coordinator.
//!
//! One batch = one transaction. Rows fan out to concurrent workers bounded by
//! a semaphore; every worker persists through the same shared transaction
//! handle and reports exactly one [`RowOutcome`] on the status stream. After
//! the post-submission barrier the coordinator inspects the shared failure
//! flag and commits or rolls back, then fires exactly one progress signal.
//!
//! Early abort: each submission acquires its pool slot and then checks the
//! failure flag; once any row has failed, no further rows are submitted.
//! Rows already in flight are not cancelled, they run to completion and are
//! undone by the rollback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::error::{ImportError, RowError};
use crate::mapper::{map_row, RowMap};
use crate::pipeline::progress::{ProgressSignals, RowOutcome};
use crate::record::{RecordProcessor, Store, Transaction};
use crate::schema::Schema;
use crate::sheet::Workbook;

/// Run one preprocessed workbook through the pool and signal the result.
///
/// Never returns an error: every failure mode ends as exactly one
/// [`ProgressSignals`] firing.
pub(crate) async fn process_batch<P, S>(
    processor: Arc<P>,
    store: Arc<S>,
    schema: Arc<Schema>,
    workbook: Workbook,
    max_in_flight: usize,
    signals: ProgressSignals,
    outcomes: mpsc::Sender<RowOutcome>,
) where
    P: RecordProcessor + 'static,
    S: Store<Tx = P::Tx> + 'static,
{
    let tx = match store.begin().await {
        Ok(tx) => Arc::new(tx),
        Err(err) => {
            tracing::error!(error = %err, "failed to open batch transaction");
            signals.fail(err.into());
            return;
        }
    };

    let semaphore = Arc::new(Semaphore::new(max_in_flight));
    let failed = Arc::new(AtomicBool::new(false));
    let mut workers: JoinSet<()> = JoinSet::new();
    let mut submitted = 0usize;

    'submission: for sheet in &workbook.sheets {
        if sheet.rows.len() <= 1 {
            continue;
        }

        let sheet_name: Arc<str> = Arc::from(sheet.name.as_str());
        let headers: Arc<[String]> = Arc::from(sheet.headers().to_vec());

        for (i, row) in sheet.data_rows().iter().enumerate() {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break 'submission,
            };
            if failed.load(Ordering::Acquire) {
                break 'submission;
            }

            submitted += 1;
            let processor = Arc::clone(&processor);
            let tx = Arc::clone(&tx);
            let schema = Arc::clone(&schema);
            let failed = Arc::clone(&failed);
            let outcomes = outcomes.clone();
            let sheet_name = Arc::clone(&sheet_name);
            let headers = Arc::clone(&headers);
            let cells = row.clone();
            let line = i + 1;

            workers.spawn(async move {
                let outcome =
                    process_row(&*processor, &tx, &schema, &headers, cells, &sheet_name, line)
                        .await;

                if !outcome.is_ok() {
                    failed.store(true, Ordering::Release);
                    tracing::debug!(
                        sheet = %outcome.sheet,
                        line = outcome.line,
                        errors = outcome.errors.len(),
                        "row failed"
                    );
                }

                // The consumer may have walked away; that never fails the job.
                let _ = outcomes.send(outcome).await;
                drop(permit);
            });
        }
    }

    // Barrier: the commit/rollback decision must not race any row write.
    while let Some(joined) = workers.join_next().await {
        if let Err(err) = joined {
            tracing::error!(error = %err, "row worker panicked");
            failed.store(true, Ordering::Release);
        }
    }
    drop(outcomes);

    tracing::info!(submitted, failed = failed.load(Ordering::Acquire), "batch drained");

    if failed.load(Ordering::Acquire) {
        match tx.rollback().await {
            Ok(()) => signals.fail(ImportError::BatchFailed),
            Err(err) => signals.fail(ImportError::Rollback(err)),
        }
        return;
    }

    match tx.commit().await {
        Ok(()) => signals.complete(),
        Err(err) => signals.fail(ImportError::Commit(err)),
    }
}

/// Carry one row through decode → initialize → validate → persist.
///
/// The first failing stage ends the row; all of its errors are captured on
/// the outcome and later stages are skipped.
async fn process_row<P: RecordProcessor>(
    processor: &P,
    tx: &P::Tx,
    schema: &Schema,
    headers: &[String],
    cells: Vec<String>,
    sheet: &str,
    line: usize,
) -> RowOutcome {
    let mut row_map = RowMap::from_row(headers, &cells);
    let values = map_row(schema, &mut row_map);

    let mut errors = Vec::new();
    match processor.decode(&values).await {
        Err(decode_errors) => errors = decode_errors,
        Ok(mut record) => {
            match processor.initialize(&mut record).await {
                // A record that does not exist yet is what an import creates.
                Ok(()) | Err(RowError::RecordNotFound) => {
                    let validation_errors = processor.validate(&record).await;
                    if !validation_errors.is_empty() {
                        errors = validation_errors;
                    } else if let Err(err) = processor.persist(record, tx).await {
                        errors.push(err);
                    }
                }
                Err(err) => errors.push(err),
            }
        }
    }

    RowOutcome { sheet: sheet.to_string(), line, values, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransactionError;
    use crate::mapper::FieldValueSet;
    use crate::pipeline::progress::{BatchProgress, StatusStream};
    use crate::preprocess::preprocess;
    use crate::schema::FieldDescriptor;
    use crate::sheet::Sheet;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct TxState {
        saved: Mutex<Vec<String>>,
        commits: AtomicUsize,
        rollbacks: AtomicUsize,
    }

    #[derive(Clone)]
    struct TestTx {
        state: Arc<TxState>,
    }

    #[async_trait]
    impl Transaction for TestTx {
        async fn commit(&self) -> Result<(), TransactionError> {
            self.state.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn rollback(&self) -> Result<(), TransactionError> {
            self.state.rollbacks.fetch_add(1, Ordering::SeqCst);
            self.state.saved.lock().await.clear();
            Ok(())
        }
    }

    #[derive(Default)]
    struct TestStore {
        state: Arc<TxState>,
    }

    #[async_trait]
    impl Store for TestStore {
        type Tx = TestTx;

        async fn begin(&self) -> Result<TestTx, TransactionError> {
            Ok(TestTx { state: Arc::clone(&self.state) })
        }
    }

    /// Rows whose `name` cell is `"bad"` fail validation; a configurable
    /// delay stretches persistence so concurrency is observable.
    #[derive(Default)]
    struct TestProcessor {
        delay: Option<Duration>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl RecordProcessor for TestProcessor {
        type Record = String;
        type Tx = TestTx;

        async fn decode(&self, values: &FieldValueSet) -> Result<String, Vec<RowError>> {
            let name = values
                .get("name")
                .and_then(|v| v.as_scalar())
                .unwrap_or_default();
            Ok(name.to_string())
        }

        async fn initialize(&self, _record: &mut String) -> Result<(), RowError> {
            Err(RowError::RecordNotFound)
        }

        async fn validate(&self, record: &String) -> Vec<RowError> {
            if record == "bad" {
                vec![
                    RowError::validation("name", "reserved word"),
                    RowError::validation("name", "too negative"),
                ]
            } else {
                vec![]
            }
        }

        async fn persist(&self, record: String, tx: &TestTx) -> Result<(), RowError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            tx.state.saved.lock().await.push(record);
            Ok(())
        }
    }

    fn workbook(names: &[&str]) -> Workbook {
        let mut rows = vec![vec!["name".to_string()]];
        rows.extend(names.iter().map(|n| vec![n.to_string()]));
        Workbook::new(vec![Sheet::new("people", rows)])
    }

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::builder("Person")
                .field(FieldDescriptor::new("name"))
                .build(),
        )
    }

    async fn run(
        processor: TestProcessor,
        store: TestStore,
        wb: Workbook,
        max_in_flight: usize,
    ) -> (Result<(), ImportError>, Vec<RowOutcome>, Arc<TxState>) {
        let state = Arc::clone(&store.state);
        let (total, wb) = preprocess(&wb);
        let (progress, signals) = BatchProgress::channel(total);
        let (tx, stream) = StatusStream::channel();

        let job = tokio::spawn(process_batch(
            Arc::new(processor),
            Arc::new(store),
            schema(),
            wb,
            max_in_flight,
            signals,
            tx,
        ));

        let outcomes = stream.drain().await;
        let result = progress.wait().await;
        job.await.unwrap();
        (result, outcomes, state)
    }

    #[tokio::test]
    async fn test_clean_batch_commits_once() {
        let (result, outcomes, state) = run(
            TestProcessor::default(),
            TestStore::default(),
            workbook(&["a", "b", "c"]),
            4,
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(RowOutcome::is_ok));
        assert_eq!(state.commits.load(Ordering::SeqCst), 1);
        assert_eq!(state.rollbacks.load(Ordering::SeqCst), 0);
        assert_eq!(state.saved.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn test_failing_row_rolls_back() {
        let (result, outcomes, state) = run(
            TestProcessor::default(),
            TestStore::default(),
            workbook(&["a", "b", "bad", "d", "e"]),
            1,
        )
        .await;

        assert!(matches!(result, Err(ImportError::BatchFailed)));
        assert_eq!(state.commits.load(Ordering::SeqCst), 0);
        assert_eq!(state.rollbacks.load(Ordering::SeqCst), 1);
        assert!(state.saved.lock().await.is_empty(), "rollback must undo persisted rows");

        // With a ceiling of 1 the failure is observed before row 4 submits.
        assert_eq!(outcomes.len(), 3);
        let bad = outcomes.iter().find(|o| o.line == 3).unwrap();
        assert_eq!(bad.errors.len(), 2, "all validation errors retained");
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_respected() {
        let names: Vec<String> = (0..60).map(|i| format!("row{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let processor = TestProcessor {
            delay: Some(Duration::from_millis(5)),
            ..TestProcessor::default()
        };

        let state_probe = Arc::new(TxState::default());
        let store = TestStore { state: Arc::clone(&state_probe) };

        // Keep a handle on the processor's counters across the move.
        let processor = Arc::new(processor);
        let (total, wb) = preprocess(&workbook(&refs));
        let (progress, signals) = BatchProgress::channel(total);
        let (tx, stream) = StatusStream::channel();
        tokio::spawn(process_batch(
            Arc::clone(&processor),
            Arc::new(store),
            schema(),
            wb,
            4,
            signals,
            tx,
        ));

        let outcomes = stream.drain().await;
        progress.wait().await.unwrap();

        assert_eq!(outcomes.len(), 60);
        assert!(
            processor.max_in_flight.load(Ordering::SeqCst) <= 4,
            "observed {} concurrent rows",
            processor.max_in_flight.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn test_early_abort_bounds_submissions() {
        let names: Vec<String> = std::iter::once("bad".to_string())
            .chain((0..40).map(|i| format!("row{i}")))
            .collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let processor = TestProcessor {
            delay: Some(Duration::from_millis(5)),
            ..TestProcessor::default()
        };

        let (result, outcomes, _) =
            run(processor, TestStore::default(), workbook(&refs), 2).await;

        assert!(result.is_err());
        assert!(
            outcomes.len() < 41,
            "early abort should stop submissions, got {}",
            outcomes.len()
        );
    }

    #[tokio::test]
    async fn test_rollback_failure_surfaced_distinctly() {
        struct FailingRollbackTx;

        #[async_trait]
        impl Transaction for FailingRollbackTx {
            async fn commit(&self) -> Result<(), TransactionError> {
                Ok(())
            }
            async fn rollback(&self) -> Result<(), TransactionError> {
                Err(TransactionError::Rollback("disk full".into()))
            }
        }

        struct FailingRollbackStore;

        #[async_trait]
        impl Store for FailingRollbackStore {
            type Tx = FailingRollbackTx;
            async fn begin(&self) -> Result<FailingRollbackTx, TransactionError> {
                Ok(FailingRollbackTx)
            }
        }

        struct RejectAll;

        #[async_trait]
        impl RecordProcessor for RejectAll {
            type Record = ();
            type Tx = FailingRollbackTx;

            async fn decode(&self, _: &FieldValueSet) -> Result<(), Vec<RowError>> {
                Err(vec![RowError::decode("nope")])
            }
            async fn initialize(&self, _: &mut ()) -> Result<(), RowError> {
                Ok(())
            }
            async fn validate(&self, _: &()) -> Vec<RowError> {
                vec![]
            }
            async fn persist(&self, _: (), _: &FailingRollbackTx) -> Result<(), RowError> {
                Ok(())
            }
        }

        let (total, wb) = preprocess(&workbook(&["a"]));
        let (progress, signals) = BatchProgress::channel(total);
        let (tx, stream) = StatusStream::channel();
        tokio::spawn(process_batch(
            Arc::new(RejectAll),
            Arc::new(FailingRollbackStore),
            schema(),
            wb,
            2,
            signals,
            tx,
        ));

        let _ = stream.drain().await;
        let err = progress.wait().await.unwrap_err();
        assert!(matches!(err, ImportError::Rollback(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn test_multi_sheet_submission_order() {
        let wb = Workbook::new(vec![
            Sheet::new("first", vec![vec!["name".into()], vec!["a".into()]]),
            Sheet::new("second", vec![vec!["name".into()], vec!["b".into()]]),
        ]);
        let (result, outcomes, state) =
            run(TestProcessor::default(), TestStore::default(), wb, 4).await;

        assert!(result.is_ok());
        assert_eq!(outcomes.len(), 2);
        let mut sheets: Vec<&str> = outcomes.iter().map(|o| o.sheet.as_str()).collect();
        sheets.sort_unstable();
        assert_eq!(sheets, vec!["first", "second"]);
        assert_eq!(state.saved.lock().await.len(), 2);
    }
}
