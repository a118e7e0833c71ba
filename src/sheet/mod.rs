//! Decoded spreadsheet model and the decoder seam.
//!
//! The import pipeline never touches file formats directly: a
//! [`SheetDecoder`] turns uploaded bytes into a [`Workbook`] of sheets, each
//! an ordered list of rows of cell texts. The first row of every sheet is its
//! header row.
//!
//! [`CsvDecoder`] is the built-in decoder: CSV with encoding and delimiter
//! auto-detection. Other formats (XLSX, ODS) plug in behind the same trait.

use crate::error::{SheetError, SheetResult};

// =============================================================================
// Workbook Model
// =============================================================================

/// One sheet: a name and ordered rows of cell texts.
///
/// Row 0 is the header row. Rows may be ragged; absent cells are treated as
/// empty by downstream consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self { name: name.into(), rows }
    }

    /// Header cells, empty if the sheet has no rows.
    pub fn headers(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rows after the header.
    pub fn data_rows(&self) -> &[Vec<String>] {
        if self.rows.len() <= 1 {
            &[]
        } else {
            &self.rows[1..]
        }
    }
}

/// A decoded spreadsheet: ordered sheets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }
}

// =============================================================================
// Decoder Seam
// =============================================================================

/// Turns uploaded bytes into a [`Workbook`].
///
/// Implementations fail with [`SheetError`] on corrupt input and must not
/// perform any row-level interpretation; that belongs to the pipeline.
pub trait SheetDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> SheetResult<Workbook>;
}

// =============================================================================
// Encoding / Delimiter Detection
// =============================================================================

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, _, _) = chardet::detect(bytes);

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to a string using the detected encoding.
pub fn decode_content(bytes: &[u8], encoding: &str) -> SheetResult<String> {
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => Ok(String::from_utf8_lossy(bytes).to_string()),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => {
            Ok(encoding_rs::ISO_8859_15.decode(bytes).0.to_string())
        }
        "windows-1252" | "cp1252" => Ok(encoding_rs::WINDOWS_1252.decode(bytes).0.to_string()),
        other => {
            if bytes.is_empty() {
                Err(SheetError::Encoding(format!("Unsupported encoding: {other}")))
            } else {
                // Fallback: lossy UTF-8
                Ok(String::from_utf8_lossy(bytes).to_string())
            }
        }
    }
}

/// Detect the delimiter by counting occurrences in the first line.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

// =============================================================================
// CSV Decoder
// =============================================================================

/// CSV decoder with encoding and delimiter auto-detection.
///
/// Produces a single-sheet [`Workbook`]; the sheet carries the configured
/// name (file stem for uploads, `"Sheet1"` for anonymous byte streams).
#[derive(Debug, Clone)]
pub struct CsvDecoder {
    /// Explicit delimiter; auto-detected when `None`.
    delimiter: Option<char>,
    /// Name given to the produced sheet.
    sheet_name: String,
}

impl Default for CsvDecoder {
    fn default() -> Self {
        Self { delimiter: None, sheet_name: "Sheet1".to_string() }
    }
}

impl CsvDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = name.into();
        self
    }
}

impl SheetDecoder for CsvDecoder {
    fn decode(&self, bytes: &[u8]) -> SheetResult<Workbook> {
        if bytes.is_empty() {
            return Err(SheetError::EmptyFile);
        }

        let encoding = detect_encoding(bytes);
        let content = decode_content(bytes, &encoding)?;
        let delimiter = self.delimiter.unwrap_or_else(|| detect_delimiter(&content));

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter as u8)
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| SheetError::Parse(e.to_string()))?;
            rows.push(record.iter().map(|cell| cell.trim().to_string()).collect());
        }

        if rows.is_empty() {
            return Err(SheetError::EmptyFile);
        }
        if rows[0].iter().all(|h| h.is_empty()) {
            return Err(SheetError::NoHeaders);
        }

        tracing::debug!(
            encoding = %encoding,
            delimiter = %delimiter,
            rows = rows.len(),
            "decoded csv sheet"
        );

        Ok(Workbook::new(vec![Sheet::new(self.sheet_name.clone(), rows)]))
    }
}
