//! Input rows and the kind of update they drive

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which product field a run updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Price,
    Inventory,
}

impl UpdateKind {
    /// Input CSV column holding the value for this kind
    pub fn value_column(&self) -> &'static str {
        match self {
            UpdateKind::Price => "price",
            UpdateKind::Inventory => "inventory",
        }
    }

    /// Remote API path
    pub fn api_path(&self) -> &'static str {
        match self {
            UpdateKind::Price => "/icbu/product/edit-price",
            UpdateKind::Inventory => "/icbu/product/edit-inventory",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::Price => "price",
            UpdateKind::Inventory => "inventory",
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "price" => Ok(UpdateKind::Price),
            "inventory" => Ok(UpdateKind::Inventory),
            other => Err(format!(
                "Unknown update type '{}' (expected 'price' or 'inventory')",
                other
            )),
        }
    }
}

/// One parsed input record
///
/// `value` is the trimmed text of the column selected by the run's
/// [`UpdateKind`]; numeric checks happen at validation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRow {
    /// 1-based data row number (header excluded)
    pub row_number: usize,
    pub spu_id: String,
    pub value: String,
}

impl UpdateRow {
    pub fn new(row_number: usize, spu_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            row_number,
            spu_id: spu_id.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_kind_parse() {
        assert_eq!("price".parse::<UpdateKind>().unwrap(), UpdateKind::Price);
        assert_eq!(" Inventory ".parse::<UpdateKind>().unwrap(), UpdateKind::Inventory);
        assert!("stock".parse::<UpdateKind>().is_err());
    }

    #[test]
    fn test_update_kind_api_paths() {
        assert_eq!(UpdateKind::Price.api_path(), "/icbu/product/edit-price");
        assert_eq!(UpdateKind::Inventory.api_path(), "/icbu/product/edit-inventory");
    }
}
