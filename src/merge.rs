// 🔀 Merge Engine - reconcile two records of the same real-world item
//
// Precedence rules:
//   text fields   incoming wins when non-blank, else base
//   price         max of the set prices (0 = unset)
//   xray pricing  field-wise max; absent side yields the other unchanged
//   identity      id, name, category, provenance always from base
//
// max and "non-blank wins" are commutative/associative on price and xray, so a
// cleanup fold over any number of duplicates lands on the same amounts.

use crate::item::{CatalogItem, XrayPricing};

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeEngine;

impl MergeEngine {
    pub fn new() -> Self {
        MergeEngine
    }

    /// Fold `incoming` into `base`; the survivor keeps base's identity
    pub fn merge(&self, base: &CatalogItem, incoming: &CatalogItem) -> CatalogItem {
        CatalogItem {
            id: base.id,
            category: base.category.clone(),
            name: base.name.clone(),
            item_type: prefer_present(&base.item_type, &incoming.item_type),
            quantity: prefer_present(&base.quantity, &incoming.quantity),
            strength: prefer_present(&base.strength, &incoming.strength),
            price: merge_price(base.price, incoming.price),
            xray_pricing: merge_xray(base.xray_pricing.as_ref(), incoming.xray_pricing.as_ref()),
            is_system_data: base.is_system_data,
            system_version: base.system_version.clone(),
            last_updated: base.last_updated,
        }
    }

    /// Bulk-import "merge" directive: name and category may also be overridden
    /// by the incoming record. Amounts still follow `merge`.
    pub fn merge_override(&self, existing: &CatalogItem, incoming: &CatalogItem) -> CatalogItem {
        let mut merged = self.merge(existing, incoming);
        merged.name = prefer_present(&existing.name, &incoming.name);
        merged.category = prefer_present(&existing.category, &incoming.category);
        merged
    }

    /// Left-to-right cumulative fold of `others` into `base`
    pub fn fold<'a, I>(&self, base: &CatalogItem, others: I) -> CatalogItem
    where
        I: IntoIterator<Item = &'a CatalogItem>,
    {
        others
            .into_iter()
            .fold(base.clone(), |acc, next| self.merge(&acc, next))
    }
}

fn prefer_present(base: &str, incoming: &str) -> String {
    if incoming.trim().is_empty() {
        base.to_string()
    } else {
        incoming.to_string()
    }
}

pub fn merge_price(base: f64, incoming: f64) -> f64 {
    match (base > 0.0, incoming > 0.0) {
        (true, true) => base.max(incoming),
        (true, false) => base,
        (false, true) => incoming,
        (false, false) => 0.0,
    }
}

pub fn merge_xray(base: Option<&XrayPricing>, incoming: Option<&XrayPricing>) -> Option<XrayPricing> {
    match (base, incoming) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (Some(a), None) => Some(*a),
        (None, Some(b)) => Some(*b),
        (None, None) => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
