//! Centralized validation and limit helpers.

use thiserror::Error;

/// Maximum number of data rows allowed in one uploaded dataset (DoS protection).
pub const MAX_ROWS: usize = 500_000;

/// Security-related constants for input validation
pub const MAX_FILENAME_LENGTH: usize = 255;
pub const MIN_FILE_CONTENT_SIZE: usize = 1;

/// Spreadsheet extensions the parsers accept.
pub const KNOWN_EXTENSIONS: [&str; 6] = ["xlsx", "xls", "xlsb", "ods", "csv", "tsv"];

/// Check if adding another row would exceed the maximum allowed.
///
/// Call this with the current count BEFORE adding a new row.
/// Returns an error message if adding would exceed the limit, None if safe to add.
#[must_use]
pub fn check_row_limit(count: usize) -> Option<String> {
    if count >= MAX_ROWS {
        Some(format!(
            "Too many rows: adding another would exceed maximum of {MAX_ROWS}"
        ))
    } else {
        None
    }
}

/// Upload validation error types
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Filename too long: exceeds {MAX_FILENAME_LENGTH} characters")]
    FilenameTooLong,
    #[error("Invalid filename: contains path traversal or invalid characters")]
    InvalidFilename,
    #[error("Empty filename provided")]
    EmptyFilename,
    #[error("File content is empty or malformed")]
    InvalidFileContent,
    #[error("Unsupported file extension (expected one of: xlsx, xls, xlsb, ods, csv, tsv)")]
    UnsupportedExtension,
}

/// Secure filename validation to prevent directory traversal and other attacks.
///
/// # Errors
///
/// Returns `ValidationError::EmptyFilename` if the filename is empty,
/// `ValidationError::FilenameTooLong` if it exceeds the limit, or
/// `ValidationError::InvalidFilename` if it contains invalid characters.
pub fn validate_filename(filename: &str) -> Result<String, ValidationError> {
    if filename.trim().is_empty() {
        return Err(ValidationError::EmptyFilename);
    }

    if filename.len() > MAX_FILENAME_LENGTH {
        return Err(ValidationError::FilenameTooLong);
    }

    // Prevent directory traversal attacks
    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        return Err(ValidationError::InvalidFilename);
    }

    // Check for null bytes and other control characters
    if filename.contains('\0') || filename.chars().any(|c| ('\x01'..='\x1F').contains(&c)) {
        return Err(ValidationError::InvalidFilename);
    }

    let sanitized = filename
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '-' || *c == '_' || *c == ' ')
        .collect::<String>();

    if sanitized.trim().is_empty() {
        return Err(ValidationError::InvalidFilename);
    }

    // Hidden files have no place in an upload form
    if sanitized.starts_with('.') {
        return Err(ValidationError::InvalidFilename);
    }

    Ok(sanitized)
}

fn has_known_extension(filename: &str) -> bool {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            KNOWN_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Validate an uploaded spreadsheet: sanitized filename (when given), a
/// recognized extension, and non-empty content.
///
/// # Errors
///
/// Returns the filename errors of [`validate_filename`],
/// `ValidationError::UnsupportedExtension` for unrecognized extensions, or
/// `ValidationError::InvalidFileContent` for empty bodies.
pub fn validate_upload(
    filename: Option<&str>,
    content: &[u8],
) -> Result<Option<String>, ValidationError> {
    if content.len() < MIN_FILE_CONTENT_SIZE {
        return Err(ValidationError::InvalidFileContent);
    }

    match filename {
        Some(name) => {
            let sanitized = validate_filename(name)?;
            if !has_known_extension(&sanitized) {
                return Err(ValidationError::UnsupportedExtension);
            }
            Ok(Some(sanitized))
        }
        None => Ok(None),
    }
}
