//! Row resolver ("vlookup")
//!
//! Joins an input row to its lookup entry and picks the update shape.
//! Pure and synchronous: no I/O, no shared state.

use crate::models::outcome::CODE_SPU_NOT_FOUND;
use crate::models::{LookupTable, UpdateRow};
use thiserror::Error;

/// Resolved target of an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub product_id: String,
    pub sku_ids: Vec<String>,
    /// `true` → per-variant update, `false` → whole-item update
    pub has_variants: bool,
}

/// SPU_ID absent from the lookup table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("SPU_ID {spu_id} not found in lookup table")]
pub struct LookupFailure {
    pub spu_id: String,
}

impl LookupFailure {
    /// Outcome code for this failure
    pub fn code(&self) -> &'static str {
        CODE_SPU_NOT_FOUND
    }
}

/// Look up `row.spu_id`
pub fn resolve(row: &UpdateRow, lookup: &LookupTable) -> Result<Resolution, LookupFailure> {
    let entry = lookup.get(&row.spu_id).ok_or_else(|| LookupFailure {
        spu_id: row.spu_id.clone(),
    })?;

    Ok(Resolution {
        product_id: entry.product_id().to_string(),
        sku_ids: entry.sku_ids().to_vec(),
        has_variants: entry.has_variants(),
    })
}
