use std::collections::HashMap;

use crate::core::value::FieldValue;

/// An in-memory tabular dataset: named columns, rows of [`FieldValue`]s.
///
/// This is the shape both uploads are parsed into before reconciliation.
/// The core never mutates a dataset after parsing; each comparison run
/// borrows it read-only.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<FieldValue>>,
}

impl Dataset {
    /// Create an empty dataset with the given column names.
    ///
    /// Duplicate column names keep all positions, but the lookup index
    /// resolves to the rightmost duplicate, matching spreadsheet-reader
    /// behavior.
    pub fn new(columns: Vec<String>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            columns,
            index,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Append a row, padding with blanks or truncating to the column count.
    pub fn push_row(&mut self, mut row: Vec<FieldValue>) {
        row.resize(self.columns.len(), FieldValue::Blank);
        self.rows.push(row);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value at (row, column name), if both exist.
    #[must_use]
    pub fn value(&self, row: usize, column: &str) -> Option<&FieldValue> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[FieldValue]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// First `limit` rows rendered as display strings, for previews.
    #[must_use]
    pub fn head(&self, limit: usize) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| row.iter().map(FieldValue::display).collect())
            .collect()
    }
}
