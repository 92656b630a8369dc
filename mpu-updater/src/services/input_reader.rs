//! Update-row input reader
//!
//! Input files carry `SPU_ID,price,inventory`; both value columns must be
//! present even though a run only uses the one matching its [`UpdateKind`].
//! Rows are yielded lazily so large files can be processed in chunks.

use super::csv_columns::{field, is_headerless, require_columns};
use crate::models::{UpdateKind, UpdateRow};
use csv::{Reader, ReaderBuilder, StringRecordsIntoIter};
use mpu_common::{Error, Result};
use std::fs::File;
use std::path::Path;

pub const REQUIRED_COLUMNS: [&str; 3] = ["SPU_ID", "price", "inventory"];

/// A record that could not be read as a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowReadError {
    pub row_number: usize,
    pub message: String,
}

/// One input record: a row, or the reason it could not be read
pub type InputRecord = std::result::Result<UpdateRow, RowReadError>;

fn open_reader(path: &Path) -> Result<Reader<File>> {
    if !path.exists() {
        return Err(Error::NotFound(format!(
            "CSV file not found: {}",
            path.display()
        )));
    }
    Ok(ReaderBuilder::new().flexible(true).from_path(path)?)
}

/// Check the header and count data rows
///
/// Used before processing so progress has a known total.
pub fn count_rows(path: &Path) -> Result<usize> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();
    if is_headerless(&headers) {
        return Ok(0);
    }
    require_columns(&headers, REQUIRED_COLUMNS, path)?;

    let mut record = csv::ByteRecord::new();
    let mut count = 0usize;
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => count += 1,
            Ok(false) => break,
            Err(e) if e.is_io_error() => return Err(e.into()),
            // Unreadable records still become (failed) rows
            Err(_) => count += 1,
        }
    }
    Ok(count)
}

/// Streaming reader over update rows
pub struct InputReader {
    records: StringRecordsIntoIter<File>,
    spu_idx: usize,
    value_idx: usize,
    row_number: usize,
    exhausted: bool,
}

impl InputReader {
    /// Open `path`, validating that all required columns are present
    ///
    /// A file without any header yields no rows.
    pub fn open(path: &Path, kind: UpdateKind) -> Result<Self> {
        let mut reader = open_reader(path)?;
        let headers = reader.headers()?.clone();
        if is_headerless(&headers) {
            return Ok(Self {
                records: reader.into_records(),
                spu_idx: 0,
                value_idx: 0,
                row_number: 0,
                exhausted: true,
            });
        }
        let [spu_idx, price_idx, inventory_idx] = require_columns(&headers, REQUIRED_COLUMNS, path)?;

        let value_idx = match kind {
            UpdateKind::Price => price_idx,
            UpdateKind::Inventory => inventory_idx,
        };

        Ok(Self {
            records: reader.into_records(),
            spu_idx,
            value_idx,
            row_number: 0,
            exhausted: false,
        })
    }

    /// Read up to `max` records
    pub fn next_chunk(&mut self, max: usize) -> Vec<InputRecord> {
        self.by_ref().take(max).collect()
    }
}

impl Iterator for InputReader {
    type Item = InputRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let record = self.records.next()?;
        self.row_number += 1;
        let row_number = self.row_number;

        Some(match record {
            Ok(record) => Ok(UpdateRow::new(
                row_number,
                field(&record, self.spu_idx),
                field(&record, self.value_idx),
            )),
            Err(e) => {
                // The underlying file is unusable; report this row and stop
                if e.is_io_error() {
                    self.exhausted = true;
                }
                Err(RowReadError {
                    row_number,
                    message: format!("Unreadable CSV record: {}", e),
                })
            }
        })
    }
}

/// Row-level validation before lookup
///
/// Prices must be non-negative decimals; inventory must be a non-negative
/// whole number.
pub fn validate_row(row: &UpdateRow, kind: UpdateKind) -> std::result::Result<(), String> {
    if row.spu_id.is_empty() {
        return Err("SPU_ID is empty".to_string());
    }
    if row.value.is_empty() {
        return Err(format!("{} value is empty", kind.value_column()));
    }

    match kind {
        UpdateKind::Price => match row.value.parse::<f64>() {
            Ok(price) if price.is_finite() && price >= 0.0 => Ok(()),
            Ok(_) => Err(format!("Invalid price '{}': must be a non-negative number", row.value)),
            Err(_) => Err(format!("Invalid price '{}': not a number", row.value)),
        },
        UpdateKind::Inventory => row
            .value
            .parse::<u64>()
            .map(|_| ())
            .map_err(|_| {
                format!(
                    "Invalid inventory '{}': must be a non-negative whole number",
                    row.value
                )
            }),
    }
}
