// 🚦 Insertion Policy - insert, reject, or auto-merge a single incoming item
//
// Two named entry points:
//   add_item            strict: an exact match is a DuplicateRecord error
//   insert_with_policy  lenient: an exact match is merged into the first one
// System data skips duplicate checks in both.

use crate::db::CatalogStore;
use crate::deduplication::DuplicateDetector;
use crate::error::{CatalogError, Result};
use crate::item::CatalogItem;
use crate::merge::MergeEngine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub(crate) const ACTOR: &str = "catalog";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertStatus {
    Inserted,
    Merged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertOutcome {
    pub status: InsertStatus,
    pub id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InsertionPolicy {
    detector: DuplicateDetector,
    merger: MergeEngine,
}

impl InsertionPolicy {
    pub fn new() -> Self {
        InsertionPolicy {
            detector: DuplicateDetector::new(),
            merger: MergeEngine::new(),
        }
    }

    /// Strict add: fails with DuplicateRecord on an exact match (non-system items)
    pub fn add_item(&self, store: &CatalogStore, item: &CatalogItem) -> Result<i64> {
        item.validate()?;

        if !item.is_system_data {
            let matches = self.detector.detect_in_store(store, item)?;
            if let Some(existing) = matches.first_exact() {
                return Err(CatalogError::DuplicateRecord {
                    name: existing.name.clone(),
                    category: existing.category.clone(),
                    existing_id: existing.require_id()?,
                });
            }
        }

        insert_new(store, item)
    }

    /// Insert, or merge into the first exact match unless `allow_duplicates`
    pub fn insert_with_policy(
        &self,
        store: &CatalogStore,
        item: &CatalogItem,
        allow_duplicates: bool,
    ) -> Result<InsertOutcome> {
        item.validate()?;

        if !item.is_system_data && !allow_duplicates {
            let matches = self.detector.detect_in_store(store, item)?;

            if let Some(existing) = matches.first_exact() {
                let id = existing.require_id()?;
                let merged = self.merger.merge(existing, item);
                store.put_item(id, &merged)?;

                store.record_event(
                    "item_merged",
                    "item",
                    id,
                    serde_json::json!({
                        "name": merged.name,
                        "category": merged.category,
                        "previous_price": existing.price,
                        "price": merged.price,
                    }),
                    ACTOR,
                );
                info!(id, name = %merged.name, category = %merged.category, "merged incoming item into existing record");

                return Ok(InsertOutcome {
                    status: InsertStatus::Merged,
                    id,
                    message: format!(
                        "Merged '{}' into existing item {} in '{}'",
                        item.name.trim(),
                        id,
                        merged.category
                    ),
                });
            }
        }

        let id = insert_new(store, item)?;
        Ok(InsertOutcome {
            status: InsertStatus::Inserted,
            id,
            message: format!("Inserted '{}' as item {}", item.name.trim(), id),
        })
    }
}

/// Unconditional insert with audit event
pub(crate) fn insert_new(store: &CatalogStore, item: &CatalogItem) -> Result<i64> {
    let id = store.insert_item(item)?;

    store.record_event(
        "item_added",
        "item",
        id,
        serde_json::json!({
            "name": item.name,
            "category": item.category,
            "price": item.price,
            "is_system_data": item.is_system_data,
        }),
        ACTOR,
    );
    debug!(id, name = %item.name, "item inserted");

    Ok(id)
}
