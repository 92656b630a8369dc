//! Header handling shared by the CSV readers

use csv::StringRecord;
use mpu_common::{Error, Result};
use std::path::Path;

/// Header name with surrounding whitespace and a UTF-8 BOM removed
fn normalize_header(name: &str) -> &str {
    name.trim_start_matches('\u{feff}').trim()
}

/// A zero-byte file (or one with a blank first line) has no header at all
pub(crate) fn is_headerless(headers: &StringRecord) -> bool {
    headers.iter().all(|h| normalize_header(h).is_empty())
}

/// Map each required column to its index, or fail naming every missing one
pub(crate) fn require_columns<const N: usize>(
    headers: &StringRecord,
    required: [&str; N],
    path: &Path,
) -> Result<[usize; N]> {
    let mut indexes = [0usize; N];
    let mut missing = Vec::new();

    for (slot, name) in indexes.iter_mut().zip(required.iter()) {
        match headers.iter().position(|h| normalize_header(h) == *name) {
            Some(idx) => *slot = idx,
            None => missing.push(*name),
        }
    }

    if missing.is_empty() {
        Ok(indexes)
    } else {
        Err(Error::InvalidInput(format!(
            "{} must contain columns {:?} (missing: {})",
            path.display(),
            required,
            missing.join(", ")
        )))
    }
}

/// Trimmed field value; absent fields read as empty
pub(crate) fn field<'r>(record: &'r StringRecord, idx: usize) -> &'r str {
    record.get(idx).map(str::trim).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_columns_any_order_with_bom() {
        let headers = StringRecord::from(vec!["\u{feff}inventory", " SPU_ID ", "price"]);
        let idx = require_columns(&headers, ["SPU_ID", "price", "inventory"], Path::new("in.csv"))
            .unwrap();
        assert_eq!(idx, [1, 2, 0]);
    }

    #[test]
    fn test_require_columns_reports_missing() {
        let headers = StringRecord::from(vec!["SPU_ID", "price"]);
        let err = require_columns(&headers, ["SPU_ID", "price", "inventory"], Path::new("in.csv"))
            .unwrap_err();
        assert!(err.to_string().contains("missing: inventory"));
    }

    #[test]
    fn test_headerless_record() {
        assert!(is_headerless(&StringRecord::new()));
        assert!(is_headerless(&StringRecord::from(vec![" "])));
        assert!(!is_headerless(&StringRecord::from(vec!["SPU_ID"])));
    }

    #[test]
    fn test_field_short_record_is_empty() {
        let record = StringRecord::from(vec![" 123 "]);
        assert_eq!(field(&record, 0), "123");
        assert_eq!(field(&record, 2), "");
    }
}
