use std::path::Path;

use rust_xlsxwriter::{DocProperties, Format, Url, Workbook};
use thiserror::Error;

use crate::export::links::{zillow_search_url, CountyLinks};
use crate::recon::report::ResultTable;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write one result table to an `.xlsx` file with hyperlinked identifier and
/// address columns.
///
/// # Errors
///
/// Returns `ExportError` if the workbook cannot be written.
pub fn write_table_file(
    table: &ResultTable,
    sheet_name: &str,
    links: Option<&CountyLinks>,
    path: &Path,
) -> Result<(), ExportError> {
    let mut workbook = build_workbook(table, sheet_name, links)?;
    workbook.save(path)?;
    Ok(())
}

/// Render one result table to in-memory `.xlsx` bytes, for HTTP download.
///
/// # Errors
///
/// Returns `ExportError` if the workbook cannot be serialized.
pub fn write_table_bytes(
    table: &ResultTable,
    sheet_name: &str,
    links: Option<&CountyLinks>,
) -> Result<Vec<u8>, ExportError> {
    let mut workbook = build_workbook(table, sheet_name, links)?;
    Ok(workbook.save_to_buffer()?)
}

fn build_workbook(
    table: &ResultTable,
    sheet_name: &str,
    links: Option<&CountyLinks>,
) -> Result<Workbook, ExportError> {
    let mut workbook = Workbook::new();
    workbook.set_properties(
        &DocProperties::new()
            .set_title(sheet_name)
            .set_comment(format!("Generated {}", chrono::Utc::now().format("%Y-%m-%d %H:%M UTC"))),
    );

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    let header_format = Format::new().set_bold();
    for (col, header) in table.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col_u16(col), *header, &header_format)?;
    }

    let parcel_col = column_position(table, "Parcel_ID");
    let address_col = column_position(table, "Address");
    let city_col = column_position(table, "City");
    let state_col = column_position(table, "State");
    let zip_col = column_position(table, "Zip");

    for (row_idx, row) in table.rows.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)] // Row count bounded by MAX_ROWS
        let excel_row = (row_idx + 1) as u32;

        for (col_idx, value) in row.iter().enumerate() {
            let col = col_u16(col_idx);

            if Some(col_idx) == parcel_col && !value.trim().is_empty() {
                if let Some(links) = links {
                    let url = links.parcel_url(value.trim());
                    worksheet.write_url(excel_row, col, Url::new(url).set_text(value))?;
                    continue;
                }
            }

            if Some(col_idx) == address_col && !value.trim().is_empty() {
                let city = cell_at(row, city_col);
                let state = cell_at(row, state_col);
                let zip = cell_at(row, zip_col);
                if let Some(url) = zillow_search_url(value, city, state, zip) {
                    worksheet.write_url(excel_row, col, Url::new(url).set_text(value))?;
                    continue;
                }
            }

            worksheet.write_string(excel_row, col, value)?;
        }
    }

    worksheet.autofit();
    Ok(workbook)
}

fn column_position(table: &ResultTable, name: &str) -> Option<usize> {
    table.headers.iter().position(|h| *h == name)
}

fn cell_at<'a>(row: &'a [String], col: Option<usize>) -> &'a str {
    col.and_then(|c| row.get(c)).map_or("", String::as_str)
}

#[allow(clippy::cast_possible_truncation)] // Column count is small and fixed
fn col_u16(col: usize) -> u16 {
    col as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> ResultTable {
        ResultTable {
            headers: vec!["Parcel_ID", "Address", "City", "State", "Zip"],
            rows: vec![
                vec![
                    "204522".to_string(),
                    "1118 Raff Rd SW".to_string(),
                    "Canton".to_string(),
                    "OH".to_string(),
                    "44710".to_string(),
                ],
                vec![
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                ],
            ],
        }
    }

    #[test]
    fn test_write_bytes_produces_workbook() {
        let table = sample_table();
        let links = CountyLinks::default();
        let bytes = write_table_bytes(&table, "Value Mismatches", Some(&links)).unwrap();
        // xlsx containers are zip files
        assert!(bytes.starts_with(b"PK"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn test_write_without_links_still_succeeds() {
        let table = sample_table();
        let bytes = write_table_bytes(&table, "Missing in MLS", None).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_write_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perfect_matches.xlsx");
        write_table_file(&sample_table(), "Perfect Matches", None, &path).unwrap();
        let metadata = std::fs::metadata(&path).unwrap();
        assert!(metadata.len() > 0);
    }
}
