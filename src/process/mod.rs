// src/process/mod.rs
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use std::{fs::File, io::Read, path::Path};
use tracing::{debug, info, warn};

use crate::error::ReviewError;

pub mod bucket;
pub mod date_parser;
pub mod transform;
pub mod utils;

pub use bucket::{Bucket, Bucketizer};
pub use date_parser::{DateFormat, DateNormalizer};
pub use transform::{CleanedReview, RecordTransformer, RowOutcome, TransformOutput};

use utils::{is_zero, normalize_header};

/// A skipped or flagged row, by the CSV line it starts on (header is line 1).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowIssue {
    pub line: usize,
    pub error: ReviewError,
}

/// The input CSV as read, before any cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Normalized column names (see [`utils::normalize_header`]).
    pub headers: Vec<String>,
    /// One `Vec<String>` per data row. Rows may be shorter or longer than `headers`.
    pub rows: Vec<Vec<String>>,
    /// Starting line of each entry in `rows`; same length as `rows`.
    /// Quoted fields can span lines, so this is not simply index + 2.
    pub lines: Vec<usize>,
    /// Records that could not be decoded at all.
    pub rejected: Vec<RowIssue>,
}

impl RawTable {
    /// Build a table whose rows sit on consecutive lines after the header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let lines = (0..rows.len()).map(|i| i + 2).collect();
        Self {
            headers: headers.iter().map(|h| normalize_header(h)).collect(),
            rows,
            lines,
            rejected: Vec::new(),
        }
    }

    /// Line the `i`th row starts on.
    pub fn line_of(&self, i: usize) -> usize {
        self.lines.get(i).copied().unwrap_or(i + 2)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(i) => {
                self.headers[i] = to.to_string();
                true
            }
            None => false,
        }
    }

    pub fn drop_column(&mut self, name: &str) -> bool {
        match self.column_index(name) {
            Some(i) => {
                self.remove_column_at(i);
                true
            }
            None => false,
        }
    }

    /// Remove every column whose cells are all numerically zero, except those
    /// named in `keep`. An empty table is left untouched.
    ///
    /// Returns the names of the removed columns, in original order.
    pub fn prune_zero_columns(&mut self, keep: &[&str]) -> Vec<String> {
        if self.rows.is_empty() {
            return Vec::new();
        }
        let zero_cols: Vec<usize> = (0..self.headers.len())
            .filter(|&i| !keep.contains(&self.headers[i].as_str()))
            .filter(|&i| {
                self.rows
                    .iter()
                    .all(|row| row.get(i).map_or(false, |cell| is_zero(cell)))
            })
            .collect();

        let removed: Vec<String> = zero_cols.iter().map(|&i| self.headers[i].clone()).collect();
        for &i in zero_cols.iter().rev() {
            self.remove_column_at(i);
        }
        removed
    }

    fn remove_column_at(&mut self, i: usize) {
        self.headers.remove(i);
        for row in &mut self.rows {
            if i < row.len() {
                row.remove(i);
            }
        }
    }
}

/// Read a reviews CSV from any reader. The first record is the header.
pub fn read_reviews_csv<R: Read>(reader: R) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // exports occasionally drop trailing empty fields
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context("reading CSV header row")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut table = RawTable::new(headers, Vec::new());
    let mut last_line = 1;
    for result in rdr.byte_records() {
        let record = result.with_context(|| format!("CSV parse error after line {}", last_line))?;
        let line = record
            .position()
            .map_or(last_line + 1, |p| p.line() as usize);
        last_line = line;

        // decode per record so one bad row does not sink the file
        match StringRecord::from_byte_record(record) {
            Ok(rec) => {
                table.rows.push(rec.iter().map(str::to_string).collect());
                table.lines.push(line);
            }
            Err(e) => {
                let error = ReviewError::InvalidUtf8 {
                    field: e.utf8_error().field(),
                };
                warn!(line, %error, "rejected row");
                table.rejected.push(RowIssue { line, error });
            }
        }
    }

    debug!(columns = ?table.headers, "read header");
    Ok(table)
}

#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_reviews_csv<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open reviews CSV: {:?}", path.as_ref()))?;
    let table = read_reviews_csv(file)
        .with_context(|| format!("Failed to read reviews CSV: {:?}", path.as_ref()))?;
    info!(
        rows = table.rows.len(),
        rejected = table.rejected.len(),
        columns = table.headers.len(),
        "loaded raw reviews"
    );
    Ok(table)
}
