//! Lookup table: primary identifier (SPU_ID) → product + variant identifiers

use serde::Serialize;
use std::collections::HashMap;

/// One reference record from the lookup file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupEntry {
    /// Catalog product identifier the remote call is made against
    product_id: String,
    /// Variant (SKU) identifiers, in file order; may be empty
    sku_ids: Vec<String>,
    /// Derived: `!sku_ids.is_empty()`
    has_variants: bool,
}

impl LookupEntry {
    /// Build an entry; `has_variants` is derived from `sku_ids`
    pub fn new(product_id: impl Into<String>, sku_ids: Vec<String>) -> Self {
        let has_variants = !sku_ids.is_empty();
        Self {
            product_id: product_id.into(),
            sku_ids,
            has_variants,
        }
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn sku_ids(&self) -> &[String] {
        &self.sku_ids
    }

    /// Whether the product is updated per-variant
    pub fn has_variants(&self) -> bool {
        self.has_variants
    }
}

/// In-memory lookup table
///
/// Built once before a run and shared read-only between workers.
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    entries: HashMap<String, LookupEntry>,
}

impl LookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry; a repeated SPU_ID overwrites the previous one
    ///
    /// Returns the replaced entry, if any.
    pub fn insert(&mut self, spu_id: impl Into<String>, entry: LookupEntry) -> Option<LookupEntry> {
        self.entries.insert(spu_id.into(), entry)
    }

    pub fn get(&self, spu_id: &str) -> Option<&LookupEntry> {
        self.entries.get(spu_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LookupEntry)> {
        self.entries.iter()
    }
}

impl FromIterator<(String, LookupEntry)> for LookupTable {
    fn from_iter<I: IntoIterator<Item = (String, LookupEntry)>>(iter: I) -> Self {
        let mut table = LookupTable::new();
        for (spu_id, entry) in iter {
            table.insert(spu_id, entry);
        }
        table
    }
}
