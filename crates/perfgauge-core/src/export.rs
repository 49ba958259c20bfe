//! Shared shape for flattened tabular exports.
//!
//! The engine has no file or network surface of its own; exports are plain
//! data handed to the embedding application.

use serde::Serialize;

/// A flattened table: a fixed header plus one row per exported record.
/// Columns discovered from custom metrics are appended after the fixed set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TabularExport {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TabularExport {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    /// Append a row; the caller keeps rows aligned with the header.
    pub fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.header.len());
        self.rows.push(row);
    }
}
