// 📄 Raw Table - header-addressed CSV rows
// Every catalog and marketplace export goes through here before any logic runs.

use crate::error::{ReconcileError, Result, SchemaError};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// A whole comma-delimited file held in memory.
///
/// Header names and cell values are trimmed of surrounding whitespace, so
/// `" Quantity"` and `"Quantity"` address the same column.
#[derive(Debug, Clone)]
pub struct RawTable {
    name: String,
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

/// One data row plus its 1-based line in the source file.
#[derive(Debug, Clone, Copy)]
pub struct RawRow<'a> {
    pub line_number: usize,
    record: &'a StringRecord,
}

impl<'a> RawRow<'a> {
    /// Cell at `index`, `None` when the row is short or the cell is blank.
    pub fn get(&self, index: usize) -> Option<&'a str> {
        self.record.get(index).filter(|v| !v.is_empty())
    }

    /// Cell at `index`, empty string when missing.
    pub fn text(&self, index: usize) -> &'a str {
        self.record.get(index).unwrap_or("")
    }
}

impl RawTable {
    /// Read a table from any reader. `name` is used in error messages.
    pub fn from_reader<R: Read>(name: impl Into<String>, reader: R) -> Result<Self> {
        let name = name.into();
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| ReconcileError::csv(&name, e))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| ReconcileError::csv(&name, e))?;
            rows.push(record);
        }

        Ok(RawTable {
            name,
            headers,
            rows,
        })
    }

    /// Read a table from a file on disk, named after its file name.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| ReconcileError::io(path.display().to_string(), e))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.csv")
            .to_string();
        Self::from_reader(name, file)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.find_column(column).is_some()
    }

    pub fn find_column(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// Index of a required column, or a `SchemaError` naming it.
    pub fn column(&self, column: &str) -> std::result::Result<usize, SchemaError> {
        self.find_column(column)
            .ok_or_else(|| SchemaError::new(&self.name, column))
    }

    pub fn rows(&self) -> impl Iterator<Item = RawRow<'_>> {
        self.rows.iter().enumerate().map(|(idx, record)| RawRow {
            line_number: idx + 2, // 1-indexed + header row
            record,
        })
    }
}
