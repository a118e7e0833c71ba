//! Workbook preprocessing: strip empty sheets and rows before import.
//!
//! The pipeline counts on the preprocessed total to size its progress
//! accounting, so this runs exactly once, up front, before any row is
//! submitted.

use crate::sheet::{Sheet, Workbook};

/// Remove empty sheets and rows, returning the cleaned workbook and the total
/// number of data rows (header rows excluded) across all sheets.
///
/// A row survives if at least one cell is non-empty; a sheet survives if at
/// least one row survives. Missing cells are treated as empty. Sheet and row
/// order is preserved. Pure and idempotent.
pub fn preprocess(workbook: &Workbook) -> (usize, Workbook) {
    let mut total_lines = 0;
    let mut sheets = Vec::new();

    for sheet in &workbook.sheets {
        let rows: Vec<Vec<String>> = sheet
            .rows
            .iter()
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .cloned()
            .collect();

        if rows.is_empty() {
            continue;
        }

        // First surviving row is the header; the rest are data.
        total_lines += rows.len() - 1;
        sheets.push(Sheet::new(sheet.name.clone(), rows));
    }

    (total_lines, Workbook::new(sheets))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: &[&[&str]]) -> Sheet {
        Sheet::new(
            "test",
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_empty_rows_removed() {
        let wb = Workbook::new(vec![sheet(&[&["a", "b"], &["", "", ""], &["c", "d"]])]);
        let (total, cleaned) = preprocess(&wb);

        assert_eq!(total, 1);
        assert_eq!(cleaned.sheets[0].rows.len(), 2);
        assert_eq!(cleaned.sheets[0].rows[1], vec!["c", "d"]);
    }

    #[test]
    fn test_empty_sheets_removed() {
        let wb = Workbook::new(vec![
            sheet(&[]),
            sheet(&[&["", ""]]),
            sheet(&[&["h"], &["x"]]),
        ]);
        let (total, cleaned) = preprocess(&wb);

        assert_eq!(cleaned.sheets.len(), 1);
        assert_eq!(total, 1);
    }

    #[test]
    fn test_header_only_sheet_counts_zero() {
        let wb = Workbook::new(vec![sheet(&[&["a", "b"]])]);
        let (total, cleaned) = preprocess(&wb);

        assert_eq!(total, 0);
        assert_eq!(cleaned.sheets.len(), 1);
    }

    #[test]
    fn test_multi_sheet_total() {
        let wb = Workbook::new(vec![
            sheet(&[&["h"], &["1"], &["2"]]),
            sheet(&[&["h"], &["3"]]),
        ]);
        let (total, _) = preprocess(&wb);

        assert_eq!(total, 3);
    }

    #[test]
    fn test_order_preserved() {
        let wb = Workbook::new(vec![sheet(&[&["h"], &["1"], &[""], &["2"], &["3"]])]);
        let (_, cleaned) = preprocess(&wb);

        let data: Vec<&str> = cleaned.sheets[0]
            .data_rows()
            .iter()
            .map(|r| r[0].as_str())
            .collect();
        assert_eq!(data, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_idempotent() {
        let wb = Workbook::new(vec![
            sheet(&[&["a", ""], &["", ""], &["c", "d"]]),
            sheet(&[&[""]]),
        ]);
        let (total1, once) = preprocess(&wb);
        let (total2, twice) = preprocess(&once);

        assert_eq!(total1, total2);
        assert_eq!(once, twice);
    }
}
