use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};

use crate::core::table::Dataset;
use crate::core::value::FieldValue;
use crate::parsing::ParseError;
use crate::utils::validation::check_row_limit;

/// Parse the first worksheet of an Excel-family workbook into a [`Dataset`].
///
/// # Errors
///
/// Returns `ParseError::Spreadsheet` if the workbook cannot be opened or the
/// sheet cannot be read, or other parse errors if the content is invalid.
pub fn read_workbook(path: &Path) -> Result<Dataset, ParseError> {
    let workbook =
        open_workbook_auto(path).map_err(|e| ParseError::Spreadsheet(e.to_string()))?;
    range_to_dataset(&first_sheet_range(workbook)?)
}

/// Parse an uploaded workbook from memory.
///
/// # Errors
///
/// Same as [`read_workbook`].
pub fn read_workbook_bytes(bytes: &[u8]) -> Result<Dataset, ParseError> {
    let workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;
    range_to_dataset(&first_sheet_range(workbook)?)
}

fn first_sheet_range<RS: Read + Seek>(mut sheets: Sheets<RS>) -> Result<Range<Data>, ParseError> {
    let name = sheets
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ParseError::InvalidFormat("workbook has no sheets".to_string()))?;
    sheets
        .worksheet_range(&name)
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))
}

fn range_to_dataset(range: &Range<Data>) -> Result<Dataset, ParseError> {
    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| ParseError::InvalidFormat("worksheet has no header row".to_string()))?;

    let columns: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| header_name(cell, i))
        .collect();

    let mut dataset = Dataset::new(columns);
    for row in rows {
        if check_row_limit(dataset.len()).is_some() {
            return Err(ParseError::TooManyRows(dataset.len()));
        }

        let values: Vec<FieldValue> = row.iter().map(cell_to_value).collect();
        // calamine can deliver phantom trailing rows; drop fully blank ones
        if values.iter().all(FieldValue::is_blank) {
            continue;
        }
        dataset.push_row(values);
    }

    Ok(dataset)
}

fn header_name(cell: &Data, index: usize) -> String {
    let rendered = match cell {
        Data::Empty => String::new(),
        other => cell_to_value(other).display(),
    };
    if rendered.is_empty() {
        format!("Column{}", index + 1)
    } else {
        rendered
    }
}

/// Spreadsheet integers are well within f64 mantissa precision
#[inline]
fn int_to_f64(i: i64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        i as f64
    }
}

fn cell_to_value(cell: &Data) -> FieldValue {
    match cell {
        Data::Empty | Data::Error(_) => FieldValue::Blank,
        Data::Int(i) => FieldValue::Number(int_to_f64(*i)),
        Data::Float(f) => FieldValue::Number(*f),
        Data::Bool(b) => FieldValue::Number(f64::from(u8::from(*b))),
        Data::String(s) => {
            if s.trim().is_empty() {
                FieldValue::Blank
            } else {
                FieldValue::Text(s.clone())
            }
        }
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => FieldValue::Text(naive.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => FieldValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => FieldValue::Text(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_conversion() {
        assert_eq!(cell_to_value(&Data::Empty), FieldValue::Blank);
        assert_eq!(cell_to_value(&Data::Int(3)), FieldValue::Number(3.0));
        assert_eq!(cell_to_value(&Data::Float(2.5)), FieldValue::Number(2.5));
        assert_eq!(cell_to_value(&Data::Bool(true)), FieldValue::Number(1.0));
        assert_eq!(
            cell_to_value(&Data::String("Central Air".to_string())),
            FieldValue::Text("Central Air".to_string())
        );
        assert_eq!(
            cell_to_value(&Data::String("   ".to_string())),
            FieldValue::Blank
        );
    }

    #[test]
    fn test_range_to_dataset_skips_blank_rows() {
        let mut range = Range::new((0, 0), (3, 1));
        range.set_value((0, 0), Data::String("PARID".to_string()));
        range.set_value((0, 1), Data::String("RMBED".to_string()));
        range.set_value((1, 0), Data::Int(101));
        range.set_value((1, 1), Data::Int(3));
        // row 2 left empty
        range.set_value((3, 0), Data::Int(102));
        range.set_value((3, 1), Data::Int(4));

        let ds = range_to_dataset(&range).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.value(1, "PARID"), Some(&FieldValue::Number(102.0)));
    }

    #[test]
    fn test_blank_header_synthesized() {
        let mut range = Range::new((0, 0), (1, 1));
        range.set_value((0, 0), Data::String("PARID".to_string()));
        range.set_value((0, 1), Data::Empty);
        range.set_value((1, 0), Data::Int(1));
        range.set_value((1, 1), Data::String("x".to_string()));

        let ds = range_to_dataset(&range).unwrap();
        assert!(ds.has_column("Column2"));
    }
}
