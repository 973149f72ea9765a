//! Parsers that turn spreadsheet exports into [`Dataset`]s.
//!
//! Excel-family workbooks go through calamine ([`xlsx`]); delimited text goes
//! through the csv crate ([`csv`]). Both enforce the shared row cap and fail
//! hard on structurally unreadable input - a dataset that cannot be parsed
//! aborts before any classification begins.

use std::path::Path;

use thiserror::Error;

use crate::core::table::Dataset;
use crate::utils::validation::MAX_ROWS;

pub mod csv;
pub mod xlsx;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("invalid dataset: {0}")]
    InvalidFormat(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Too many rows: {0} exceeds maximum allowed ({MAX_ROWS})")]
    TooManyRows(usize),
}

/// Load a dataset from a file path, dispatching on the extension.
///
/// # Errors
///
/// Returns `ParseError::UnsupportedFormat` for unknown extensions, or the
/// underlying reader's error if the content is invalid.
pub fn load_dataset(path: &Path) -> Result<Dataset, ParseError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    match extension.as_deref() {
        Some("xlsx" | "xls" | "xlsb" | "ods") => xlsx::read_workbook(path),
        Some("csv") => csv::read_file(path, b','),
        Some("tsv") => csv::read_file(path, b'\t'),
        Some(ext) => Err(ParseError::UnsupportedFormat(ext.to_string())),
        // No extension - assume delimited text
        None => csv::read_file(path, b','),
    }
}

/// Load a dataset from uploaded bytes.
///
/// Workbook formats are detected by magic bytes (zip for xlsx/xlsb/ods, OLE
/// for legacy xls); anything else is treated as delimited text, with the
/// delimiter taken from the filename extension.
///
/// # Errors
///
/// Returns the underlying reader's error if the content is invalid.
pub fn load_dataset_bytes(bytes: &[u8], filename: Option<&str>) -> Result<Dataset, ParseError> {
    if is_workbook_content(bytes) {
        return xlsx::read_workbook_bytes(bytes);
    }

    let delimiter = match filename.and_then(|f| Path::new(f).extension()?.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    };
    csv::read(bytes, delimiter)
}

/// Zip local-file header (xlsx/xlsb/ods) or OLE compound document (xls).
fn is_workbook_content(bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0])
}
