use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("No worksheets found in the Excel file")]
    NoWorksheet,
    #[error("No data found in the Excel file")]
    EmptyWorkbook,
    #[error("Unreadable workbook: {0}")]
    Unreadable(#[from] calamine::Error),
}

/// Result of ingesting one workbook: header names in worksheet order and
/// one JSON object per retained data row.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

/// Parse raw workbook bytes (`.xlsx` or `.xls`), reading only the first
/// worksheet. Pure transformation; the caller owns all failure bookkeeping
/// (marking the upload record failed, removing the stored file).
pub fn parse_workbook(bytes: &[u8]) -> Result<ParsedSheet, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ParseError::NoWorksheet)?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let raw_rows: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();
    table_from_rows(&raw_rows)
}

/// Build the header list and row records from raw worksheet rows.
///
/// The first row is the header row: textual cells are trimmed, other cells
/// stringified, and blank results dropped. A dropped header drops its whole
/// column — each retained header keeps its raw column index so it still
/// reads the cells of its original column.
pub fn table_from_rows(raw_rows: &[Vec<Data>]) -> Result<ParsedSheet, ParseError> {
    let header_row = raw_rows.first().ok_or(ParseError::EmptyWorkbook)?;

    let columns: Vec<(usize, String)> = header_row
        .iter()
        .enumerate()
        .filter_map(|(index, cell)| {
            let name = match cell {
                Data::String(s) => s.trim().to_string(),
                Data::Empty => String::new(),
                other => other.to_string(),
            };
            if name.is_empty() {
                None
            } else {
                Some((index, name))
            }
        })
        .collect();

    if raw_rows.len() < 2 {
        return Err(ParseError::EmptyWorkbook);
    }

    let rows: Vec<Map<String, Value>> = raw_rows[1..]
        .iter()
        .filter(|row| row.iter().any(cell_has_content))
        .map(|row| {
            columns
                .iter()
                .map(|(index, name)| {
                    let value = row.get(*index).map(cell_to_value).unwrap_or(Value::Null);
                    (name.clone(), value)
                })
                .collect()
        })
        .collect();

    let headers = columns.into_iter().map(|(_, name)| name).collect();

    Ok(ParsedSheet { headers, rows })
}

/// Fully blank rows are dropped from the parsed table. A cell counts as
/// content unless it is empty or an empty string.
fn cell_has_content(cell: &Data) -> bool {
    match cell {
        Data::Empty => false,
        Data::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::Number((*i).into()),
        Data::Float(f) => number_value(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => number_value(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(e) => Value::String(e.to_string()),
    }
}

// NaN/infinite floats have no JSON representation; treat them as missing.
fn number_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn s(text: &str) -> Data {
        Data::String(text.to_string())
    }

    fn n(value: f64) -> Data {
        Data::Float(value)
    }

    #[test]
    fn test_blank_header_drops_its_column() {
        let rows = vec![
            vec![s("A"), s("B"), s("")],
            vec![n(1.0), n(2.0), n(3.0)],
        ];

        let sheet = table_from_rows(&rows).unwrap();

        assert_eq!(sheet.headers, vec!["A", "B"]);
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0].get("A"), Some(&json!(1.0)));
        assert_eq!(sheet.rows[0].get("B"), Some(&json!(2.0)));
        assert!(!sheet.rows[0].contains_key(""));
    }

    #[test]
    fn test_interior_blank_header_keeps_column_alignment() {
        // "B"'s raw column is dropped; "C" must still read its own column.
        let rows = vec![
            vec![s("A"), Data::Empty, s("C")],
            vec![s("a1"), s("b1"), s("c1")],
        ];

        let sheet = table_from_rows(&rows).unwrap();

        assert_eq!(sheet.headers, vec!["A", "C"]);
        assert_eq!(sheet.rows[0].get("A"), Some(&json!("a1")));
        assert_eq!(sheet.rows[0].get("C"), Some(&json!("c1")));
    }

    #[test]
    fn test_headers_are_trimmed_and_stringified() {
        let rows = vec![
            vec![s("  Region  "), n(2024.0), Data::Bool(true)],
            vec![s("East"), n(1.0), n(2.0)],
        ];

        let sheet = table_from_rows(&rows).unwrap();

        assert_eq!(sheet.headers[0], "Region");
        assert_eq!(sheet.headers[1], "2024");
        assert_eq!(sheet.rows[0].get("Region"), Some(&json!("East")));
    }

    #[test]
    fn test_no_rows_at_all_is_empty_workbook() {
        let err = table_from_rows(&[]).unwrap_err();
        assert!(matches!(err, ParseError::EmptyWorkbook));
    }

    #[test]
    fn test_header_only_is_empty_workbook() {
        let rows = vec![vec![s("A"), s("B")]];
        let err = table_from_rows(&rows).unwrap_err();
        assert!(matches!(err, ParseError::EmptyWorkbook));
    }

    #[test]
    fn test_fully_blank_rows_are_dropped() {
        let rows = vec![
            vec![s("A"), s("B")],
            vec![Data::Empty, s("")],
            vec![s("x"), n(1.0)],
            vec![Data::Empty, Data::Empty],
        ];

        let sheet = table_from_rows(&rows).unwrap();

        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0].get("A"), Some(&json!("x")));
    }

    #[test]
    fn test_missing_trailing_cells_become_null() {
        let rows = vec![
            vec![s("A"), s("B"), s("C")],
            vec![s("x")],
        ];

        let sheet = table_from_rows(&rows).unwrap();

        assert_eq!(sheet.rows[0].get("A"), Some(&json!("x")));
        assert_eq!(sheet.rows[0].get("B"), Some(&Value::Null));
        assert_eq!(sheet.rows[0].get("C"), Some(&Value::Null));
    }

    #[test]
    fn test_empty_string_cells_are_kept_in_row_records() {
        // An empty-string cell does not blank the whole row and survives
        // into the record (only null filtering happens later, at
        // extraction).
        let rows = vec![
            vec![s("A"), s("B")],
            vec![s(""), n(5.0)],
        ];

        let sheet = table_from_rows(&rows).unwrap();

        assert_eq!(sheet.rows[0].get("A"), Some(&json!("")));
        assert_eq!(sheet.rows[0].get("B"), Some(&json!(5.0)));
    }

    #[test]
    fn test_parse_workbook_round_trip() {
        use rust_xlsxwriter::Workbook;

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(0, 0, "Region").unwrap();
        worksheet.write_string(0, 1, "Sales").unwrap();
        worksheet.write_string(1, 0, "East").unwrap();
        worksheet.write_number(1, 1, 10.0).unwrap();
        worksheet.write_string(2, 0, "West").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let sheet = parse_workbook(&bytes).unwrap();

        assert_eq!(sheet.headers, vec!["Region", "Sales"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].get("Region"), Some(&json!("East")));
        assert_eq!(sheet.rows[0].get("Sales"), Some(&json!(10.0)));
        assert_eq!(sheet.rows[1].get("Sales"), Some(&Value::Null));
    }

    #[test]
    fn test_parse_workbook_rejects_empty_sheet() {
        use rust_xlsxwriter::Workbook;

        let mut workbook = Workbook::new();
        workbook.add_worksheet();
        let bytes = workbook.save_to_buffer().unwrap();

        let err = parse_workbook(&bytes).unwrap_err();
        assert!(matches!(err, ParseError::EmptyWorkbook));
    }
}
