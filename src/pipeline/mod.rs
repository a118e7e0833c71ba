//! The import pipeline: orchestration of staging, decoding, preprocessing
//! and the concurrent row-processing job.
//!
//! # Example
//!
//! ```rust,ignore
//! use sheetload::pipeline::{Importer, ImportOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let importer = Importer::new(schema, processor, store);
//!     let (progress, mut status) = importer.import(upload).await?;
//!
//!     while let Some(outcome) = status.recv().await {
//!         println!("line {}: {} error(s)", outcome.line, outcome.errors.len());
//!     }
//!     progress.wait().await?;
//!     Ok(())
//! }
//! ```

mod pool;
pub mod progress;

pub use progress::{BatchProgress, RowOutcome, StatusStream};

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::error::ImportResult;
use crate::preprocess::preprocess;
use crate::record::{RecordProcessor, Store};
use crate::schema::Schema;
use crate::sheet::{CsvDecoder, SheetDecoder, Workbook};

/// Options for one import run.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Maximum rows in flight at once.
    pub max_in_flight: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self { max_in_flight: 20 }
    }
}

/// Drives imports of one schema against one processor/store pair.
///
/// `import` stages the upload, decodes and preprocesses it, then launches the
/// processing job in the background and returns immediately; all row-level
/// and transactional outcomes arrive through the returned handles.
pub struct Importer<P, S> {
    schema: Arc<Schema>,
    decoder: Arc<dyn SheetDecoder>,
    processor: Arc<P>,
    store: Arc<S>,
    options: ImportOptions,
}

impl<P, S> Importer<P, S>
where
    P: RecordProcessor + 'static,
    S: Store<Tx = P::Tx> + 'static,
{
    /// An importer with the built-in CSV decoder and default options.
    pub fn new(schema: impl Into<Arc<Schema>>, processor: P, store: S) -> Self {
        Self {
            schema: schema.into(),
            decoder: Arc::new(CsvDecoder::new()),
            processor: Arc::new(processor),
            store: Arc::new(store),
            options: ImportOptions::default(),
        }
    }

    /// Swap in another spreadsheet decoder (XLSX, ODS, fixtures).
    pub fn with_decoder(mut self, decoder: impl SheetDecoder + 'static) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    /// Import a spreadsheet from a byte stream.
    ///
    /// The stream is buffered to a temporary file first; the file is removed
    /// once decoding completes, whatever the outcome. Fails immediately on
    /// staging (I/O) or decoding (format) errors; everything after that is
    /// reported asynchronously through the returned [`BatchProgress`] and
    /// [`StatusStream`].
    pub async fn import<R>(&self, mut reader: R) -> ImportResult<(BatchProgress, StatusStream)>
    where
        R: AsyncRead + Unpin + Send,
    {
        let staged = tempfile::NamedTempFile::new()?;
        let mut file = tokio::fs::File::create(staged.path()).await?;
        let bytes_staged = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;

        let bytes = tokio::fs::read(staged.path()).await?;
        // Decoding is done with the bytes in memory; the staging file can go.
        drop(staged);
        tracing::debug!(bytes = bytes_staged, "upload staged");

        self.import_bytes(&bytes).await
    }

    /// Import a spreadsheet already held in memory, skipping the staging
    /// file.
    pub async fn import_bytes(&self, bytes: &[u8]) -> ImportResult<(BatchProgress, StatusStream)> {
        let workbook = self.decoder.decode(bytes)?;
        self.import_workbook(workbook).await
    }

    /// Import an already-decoded workbook, skipping staging and decoding.
    ///
    /// For callers that decoded the file themselves, e.g. to harvest headers
    /// before building the schema.
    pub async fn import_workbook(
        &self,
        workbook: Workbook,
    ) -> ImportResult<(BatchProgress, StatusStream)> {
        let (total_lines, workbook) = preprocess(&workbook);

        let (progress, signals) = BatchProgress::channel(total_lines);
        let (outcome_tx, status) = StatusStream::channel();

        tracing::info!(
            batch_id = %progress.batch_id,
            schema = self.schema.name(),
            sheets = workbook.sheets.len(),
            total_lines,
            "starting import"
        );

        tokio::spawn(pool::process_batch(
            Arc::clone(&self.processor),
            Arc::clone(&self.store),
            Arc::clone(&self.schema),
            workbook,
            self.options.max_in_flight,
            signals,
            outcome_tx,
        ));

        Ok((progress, status))
    }
}
