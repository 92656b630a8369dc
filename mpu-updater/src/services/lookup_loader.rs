//! Lookup table loader
//!
//! Reads the reference CSV (`SPU_ID,Product_ID,SKU_IDs`) into a
//! [`LookupTable`]. `SKU_IDs` is a comma-separated list inside one field,
//! so it is normally quoted: `123,456,"s1,s2"`.

use super::csv_columns::{field, is_headerless, require_columns};
use crate::models::{LookupEntry, LookupTable};
use csv::ReaderBuilder;
use mpu_common::{Error, Result};
use std::path::Path;

pub const SPU_ID_COLUMN: &str = "SPU_ID";
pub const PRODUCT_ID_COLUMN: &str = "Product_ID";
pub const SKU_IDS_COLUMN: &str = "SKU_IDs";

/// Split a SKU list on commas, trimming and dropping empty tokens
pub fn parse_sku_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load the lookup table from `path`
///
/// A repeated SPU_ID overwrites the earlier entry. Rows with an empty SPU_ID
/// and unreadable records are skipped with a warning.
pub fn load_lookup_table(path: &Path) -> Result<LookupTable> {
    if !path.exists() {
        return Err(Error::NotFound(format!(
            "SKU lookup CSV file not found: {}",
            path.display()
        )));
    }

    tracing::info!(path = %path.display(), "Loading SKU lookup data");

    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    if is_headerless(&headers) {
        tracing::warn!(path = %path.display(), "Lookup file is empty, every row will fail lookup");
        return Ok(LookupTable::new());
    }
    let [spu_idx, product_idx, skus_idx] =
        require_columns(&headers, [SPU_ID_COLUMN, PRODUCT_ID_COLUMN, SKU_IDS_COLUMN], path)?;

    let mut table = LookupTable::new();
    let mut duplicates = 0usize;

    for (index, record) in reader.records().enumerate() {
        let line = index + 2; // header is line 1
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line, error = %e, "Skipping unreadable lookup row");
                continue;
            }
        };

        let spu_id = field(&record, spu_idx);
        if spu_id.is_empty() {
            tracing::warn!(line, "Skipping lookup row with empty SPU_ID");
            continue;
        }

        let entry = LookupEntry::new(field(&record, product_idx), parse_sku_ids(field(&record, skus_idx)));
        if table.insert(spu_id, entry).is_some() {
            duplicates += 1;
            tracing::debug!(line, spu_id, "Duplicate SPU_ID in lookup file, last occurrence wins");
        }
    }

    tracing::info!(
        mappings = table.len(),
        duplicates,
        "Loaded SPU_ID mappings"
    );

    Ok(table)
}
