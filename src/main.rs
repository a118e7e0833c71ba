//! Sheetload CLI - import spreadsheets into JSON record batches
//!
//! # Main Commands
//!
//! ```bash
//! sheetload import data.csv --out records.json   # Full transactional import
//! sheetload inspect data.csv                     # Decode and preview a file
//! ```
//!
//! The import command treats the whole file as one batch: either every row
//! validates and the output is written, or the batch rolls back and nothing
//! is, with a line-by-line error report either way.

use clap::{Parser, Subcommand};
use futures::StreamExt;
use sheetload::{
    preprocess, CsvDecoder, FieldDescriptor, ImportOptions, Importer, JsonFileStore,
    JsonRecordProcessor, MemoryStore, RowOutcome, Schema, SheetDecoder, Store, Workbook,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheetload")]
#[command(about = "Transactional spreadsheet batch import", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a spreadsheet as one all-or-nothing batch
    Import {
        /// Input spreadsheet file (CSV)
        input: PathBuf,

        /// Comma-separated field labels (default: every header in the file)
        #[arg(short, long)]
        fields: Option<String>,

        /// JSON Schema file to validate each record against
        #[arg(short, long)]
        validate: Option<PathBuf>,

        /// Write committed records to this JSON file (default: print to stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Cell delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Maximum rows processed concurrently
        #[arg(long, default_value_t = 20)]
        max_in_flight: usize,
    },

    /// Decode a spreadsheet and preview its contents
    Inspect {
        /// Input spreadsheet file (CSV)
        input: PathBuf,

        /// Number of data rows to preview
        #[arg(short, long, default_value_t = 5)]
        rows: usize,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Import { input, fields, validate, out, delimiter, max_in_flight } => {
            cmd_import(input, fields, validate, out, delimiter, max_in_flight).await
        }
        Commands::Inspect { input, rows } => cmd_inspect(&input, rows),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

type CliError = Box<dyn std::error::Error>;

async fn cmd_import(
    input: PathBuf,
    fields: Option<String>,
    validate: Option<PathBuf>,
    out: Option<PathBuf>,
    delimiter: Option<char>,
    max_in_flight: usize,
) -> Result<(), CliError> {
    // One decode serves both the schema harvest and the import itself.
    let decoder = decoder_for(&input, delimiter);
    let workbook = decoder.decode(&tokio::fs::read(&input).await?)?;
    let schema = build_schema(&workbook, fields);

    let mut processor = JsonRecordProcessor::new();
    if let Some(schema_path) = validate {
        let schema_json = serde_json::from_str(&std::fs::read_to_string(schema_path)?)?;
        processor = processor.with_validation(schema_json);
    }

    let options = ImportOptions { max_in_flight };

    match out {
        Some(path) => {
            let importer = Importer::new(schema, processor, JsonFileStore::new(&path))
                .with_options(options);
            run_import(&importer, workbook, &input).await?;
            println!("→ Committed batch written to {}", path.display());
            Ok(())
        }
        None => {
            let store = MemoryStore::new();
            let records = store.records();
            let importer = Importer::new(schema, processor, store).with_options(options);
            run_import(&importer, workbook, &input).await?;
            let committed = records.lock().await;
            println!("{}", serde_json::to_string_pretty(&*committed)?);
            Ok(())
        }
    }
}

/// Run one import and print the line-by-line report.
async fn run_import<S>(
    importer: &Importer<JsonRecordProcessor, S>,
    workbook: Workbook,
    input: &Path,
) -> Result<(), CliError>
where
    S: Store<Tx = sheetload::JsonTransaction> + 'static,
{
    let (progress, status) = importer.import_workbook(workbook).await?;

    println!(
        "Importing {} ({} data rows, batch {})",
        input.display(),
        progress.total_lines,
        progress.batch_id
    );

    let mut failures = 0usize;
    let mut processed = 0usize;
    let mut stream = status.into_stream();
    while let Some(outcome) = stream.next().await {
        processed += 1;
        print_outcome(&outcome);
        if !outcome.is_ok() {
            failures += 1;
        }
    }

    println!("Processed {processed} row(s), {failures} failed");
    progress.wait().await?;
    println!("✓ Batch committed");
    Ok(())
}

fn print_outcome(outcome: &RowOutcome) {
    if outcome.is_ok() {
        println!("  ✓ {}:{}", outcome.sheet, outcome.line);
    } else {
        println!("  ✗ {}:{}", outcome.sheet, outcome.line);
        for err in &outcome.errors {
            println!("      {err}");
        }
    }
}

fn decoder_for(input: &Path, delimiter: Option<char>) -> CsvDecoder {
    let sheet_name = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Sheet1")
        .to_string();
    let mut decoder = CsvDecoder::new().with_sheet_name(sheet_name);
    if let Some(d) = delimiter {
        decoder = decoder.with_delimiter(d);
    }
    decoder
}

/// Build the import schema from `--fields`, or from the workbook's own
/// headers.
fn build_schema(workbook: &Workbook, fields: Option<String>) -> Schema {
    let labels: Vec<String> = match fields {
        Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
        None => workbook
            .sheets
            .first()
            .map(|s| s.headers().to_vec())
            .unwrap_or_default(),
    };

    let mut builder = Schema::builder("record");
    let mut seen: Vec<String> = Vec::new();
    for label in &labels {
        if label.is_empty() || seen.contains(label) {
            continue;
        }
        seen.push(label.clone());

        // A repeated header is a sequential-column run, registered once.
        let descriptor = if labels.iter().filter(|l| *l == label).count() > 1 {
            FieldDescriptor::new(label.clone()).with_sequential_columns()
        } else {
            FieldDescriptor::new(label.clone())
        };
        builder = builder.field(descriptor);
    }
    builder.build()
}

fn cmd_inspect(input: &Path, rows: usize) -> Result<(), CliError> {
    let decoder = decoder_for(input, None);
    let workbook = decoder.decode(&std::fs::read(input)?)?;
    let (total, workbook) = preprocess(&workbook);

    println!("{}: {} sheet(s), {} data row(s)", input.display(), workbook.sheets.len(), total);
    for sheet in &workbook.sheets {
        println!("\nSheet '{}'", sheet.name);
        println!("  headers: {}", sheet.headers().join(", "));
        for (i, row) in sheet.data_rows().iter().take(rows).enumerate() {
            println!("  [{:3}] {}", i + 1, row.join(" | "));
        }
        let remaining = sheet.data_rows().len().saturating_sub(rows);
        if remaining > 0 {
            println!("  ... {remaining} more row(s)");
        }
    }
    Ok(())
}
