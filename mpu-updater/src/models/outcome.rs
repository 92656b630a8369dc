//! Per-row outcomes
//!
//! Every input row produces exactly one [`UpdateOutcome`], whatever happened
//! to it. Row-level failures are data, not errors.

use super::UpdateKind;
use serde::Serialize;
use std::fmt;

/// Product id recorded when the SPU_ID is absent from the lookup table
pub const NOT_FOUND_PRODUCT_ID: &str = "NOT_FOUND";

/// Product id recorded when the row never got as far as a lookup
pub const UNKNOWN_PRODUCT_ID: &str = "UNKNOWN";

/// Response code meaning success
pub const SUCCESS_CODE: &str = "0";

/// Local outcome codes
pub const CODE_SPU_NOT_FOUND: &str = "SPU_NOT_FOUND";
pub const CODE_VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const CODE_PROCESSING_ERROR: &str = "PROCESSING_ERROR";
pub const CODE_TRANSPORT_ERROR: &str = "ERROR";

/// What was done (or attempted) for a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// One call carrying a (sku_id, value) pair per variant
    VariantUpdate,
    /// One call carrying a single value for the whole product
    WholeItemUpdate,
    /// SPU_ID missing from the lookup table; no call made
    LookupFailure,
    /// Row malformed; no lookup or call made
    ValidationFailure,
    /// Worker task failed unexpectedly
    ProcessingFailure,
}

impl OperationKind {
    /// Report label, e.g. `sku_price` or `direct_inventory`
    pub fn label(&self, kind: UpdateKind) -> &'static str {
        match (self, kind) {
            (OperationKind::VariantUpdate, UpdateKind::Price) => "sku_price",
            (OperationKind::VariantUpdate, UpdateKind::Inventory) => "sku_inventory",
            (OperationKind::WholeItemUpdate, UpdateKind::Price) => "direct_price",
            (OperationKind::WholeItemUpdate, UpdateKind::Inventory) => "direct_inventory",
            (OperationKind::LookupFailure, _) => "vlookup",
            (OperationKind::ValidationFailure, _) => "validation",
            (OperationKind::ProcessingFailure, _) => "processing",
        }
    }
}

/// Result of processing one row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOutcome {
    /// 1-based input row number
    pub row_number: usize,
    pub spu_id: String,
    /// Resolved product id, or [`NOT_FOUND_PRODUCT_ID`] / [`UNKNOWN_PRODUCT_ID`]
    pub product_id: String,
    pub update_kind: UpdateKind,
    pub operation: OperationKind,
    /// Value that was (or would have been) applied
    pub value: String,
    /// Variant ids touched by the call (empty for whole-item updates and failures)
    pub sku_ids: Vec<String>,
    pub success: bool,
    /// Remote response code or a local code such as `SPU_NOT_FOUND`
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
    /// Attempts beyond the first
    pub retry_count: u32,
}

impl UpdateOutcome {
    /// Report label for the operation
    pub fn operation_label(&self) -> &'static str {
        self.operation.label(self.update_kind)
    }

    /// Lookup failure: SPU_ID not in the table
    pub fn lookup_failure(
        row_number: usize,
        spu_id: &str,
        update_kind: UpdateKind,
        value: &str,
        message: String,
    ) -> Self {
        Self {
            row_number,
            spu_id: spu_id.to_string(),
            product_id: NOT_FOUND_PRODUCT_ID.to_string(),
            update_kind,
            operation: OperationKind::LookupFailure,
            value: value.to_string(),
            sku_ids: Vec::new(),
            success: false,
            code: CODE_SPU_NOT_FOUND.to_string(),
            message,
            request_id: None,
            retry_count: 0,
        }
    }

    /// Malformed row
    pub fn validation_failure(
        row_number: usize,
        spu_id: &str,
        update_kind: UpdateKind,
        value: &str,
        message: String,
    ) -> Self {
        Self {
            row_number,
            spu_id: spu_id.to_string(),
            product_id: UNKNOWN_PRODUCT_ID.to_string(),
            update_kind,
            operation: OperationKind::ValidationFailure,
            value: value.to_string(),
            sku_ids: Vec::new(),
            success: false,
            code: CODE_VALIDATION_ERROR.to_string(),
            message,
            request_id: None,
            retry_count: 0,
        }
    }

    /// Worker task crashed before producing an outcome
    pub fn processing_failure(
        row_number: usize,
        spu_id: &str,
        update_kind: UpdateKind,
        message: String,
    ) -> Self {
        Self {
            row_number,
            spu_id: spu_id.to_string(),
            product_id: UNKNOWN_PRODUCT_ID.to_string(),
            update_kind,
            operation: OperationKind::ProcessingFailure,
            value: String::new(),
            sku_ids: Vec::new(),
            success: false,
            code: CODE_PROCESSING_ERROR.to_string(),
            message,
            request_id: None,
            retry_count: 0,
        }
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SPU {} -> Product {}: [{}] {}",
            self.spu_id, self.product_id, self.code, self.message
        )
    }
}
