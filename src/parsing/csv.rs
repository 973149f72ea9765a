use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;

use crate::core::table::Dataset;
use crate::core::value::FieldValue;
use crate::parsing::ParseError;
use crate::utils::validation::check_row_limit;

/// Parse a delimited text file into a [`Dataset`].
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or other parse
/// errors if the content is invalid.
pub fn read_file(path: &Path, delimiter: u8) -> Result<Dataset, ParseError> {
    let file = std::fs::File::open(path)?;
    read(file, delimiter)
}

/// Parse delimited text into a [`Dataset`]. The first record is the header;
/// fields are number-inferred per cell, and all-blank records are skipped.
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` if no header row is present, or
/// `ParseError::TooManyRows` if the row cap is exceeded.
pub fn read<R: Read>(reader: R, delimiter: u8) -> Result<Dataset, ParseError> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| header_name(h, i))
        .collect();
    if headers.is_empty() {
        return Err(ParseError::InvalidFormat("no header row found".to_string()));
    }

    let mut dataset = Dataset::new(headers);
    for record in rdr.records() {
        if check_row_limit(dataset.len()).is_some() {
            return Err(ParseError::TooManyRows(dataset.len()));
        }

        let record = record?;
        let row: Vec<FieldValue> = record.iter().map(FieldValue::from_raw).collect();
        if row.iter().all(FieldValue::is_blank) {
            continue;
        }
        dataset.push_row(row);
    }

    Ok(dataset)
}

/// Blank header cells get a synthesized positional name.
fn header_name(raw: &str, index: usize) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        format!("Column{}", index + 1)
    } else {
        trimmed.to_string()
    }
}
