// ⚖️ Bulk Reconciliation - execute caller-chosen directives over an import batch
//
// Conflicts are resolved upstream (e.g. in a review UI); this only carries out
// the chosen action per index. Items are independent: a failure is recorded as
// "Item <index>: <reason>", counted as skipped, and the batch continues.

use crate::db::CatalogStore;
use crate::error::{CatalogError, Result};
use crate::item::CatalogItem;
use crate::merge::MergeEngine;
use crate::policy::{insert_new, ACTOR};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

// ============================================================================
// IMPORT DIRECTIVE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ImportDirective {
    /// Leave the incoming item out
    #[default]
    Skip,

    /// Insert unconditionally
    Import,

    /// Replace the record at target with the incoming item
    Update {
        #[serde(alias = "targetId")]
        target_id: i64,
    },

    /// Remove the record at target, then insert the incoming item fresh
    #[serde(alias = "delete", alias = "delete_import")]
    DeleteAndImport {
        #[serde(alias = "targetId")]
        target_id: i64,
    },

    /// Override-merge the incoming item into the record at target
    Merge {
        #[serde(alias = "targetId")]
        target_id: i64,
    },
}

impl ImportDirective {
    /// Unrecognized or malformed directives fall back to Skip
    pub fn from_value(value: &Value) -> Self {
        match serde_json::from_value(value.clone()) {
            Ok(directive) => directive,
            Err(e) => {
                warn!(directive = %value, error = %e, "unrecognized import directive, skipping");
                ImportDirective::Skip
            }
        }
    }
}

pub type DirectiveMap = HashMap<usize, ImportDirective>;

/// Accepts `{"0": {...}, "2": {...}}` or `[{...}, {...}]`; anything else is empty
pub fn parse_directives(value: &Value) -> DirectiveMap {
    match value {
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| {
                k.trim()
                    .parse::<usize>()
                    .ok()
                    .map(|index| (index, ImportDirective::from_value(v)))
            })
            .collect(),
        Value::Array(list) => list
            .iter()
            .enumerate()
            .map(|(index, v)| (index, ImportDirective::from_value(v)))
            .collect(),
        _ => DirectiveMap::new(),
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportReport {
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl BulkImportReport {
    pub fn summary(&self) -> String {
        format!(
            "Bulk import: {} imported, {} updated, {} skipped, {} errors",
            self.imported,
            self.updated,
            self.skipped,
            self.errors.len()
        )
    }
}

enum Applied {
    Imported,
    Updated,
    Skipped,
}

// ============================================================================
// BULK RECONCILER
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct BulkReconciler {
    merger: MergeEngine,
}

impl BulkReconciler {
    pub fn new() -> Self {
        BulkReconciler {
            merger: MergeEngine::new(),
        }
    }

    pub fn bulk_import(
        &self,
        store: &CatalogStore,
        items: &[CatalogItem],
        directives: &DirectiveMap,
    ) -> BulkImportReport {
        self.run(store, items.iter().cloned().map(Ok), directives)
    }

    /// Same as `bulk_import`, with items that already failed boundary parsing
    /// reported as per-item errors
    pub fn run<I>(&self, store: &CatalogStore, items: I, directives: &DirectiveMap) -> BulkImportReport
    where
        I: IntoIterator<Item = Result<CatalogItem>>,
    {
        let mut report = BulkImportReport::default();

        for (index, parsed) in items.into_iter().enumerate() {
            let directive = directives.get(&index).copied().unwrap_or_default();

            let outcome = parsed.and_then(|item| self.apply(store, &item, directive));

            match outcome {
                Ok(Applied::Imported) => report.imported += 1,
                Ok(Applied::Updated) => report.updated += 1,
                Ok(Applied::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(index, ?directive, error = %e, "bulk import item failed");
                    report.errors.push(format!("Item {index}: {e}"));
                    report.skipped += 1;
                }
            }
        }

        info!(
            imported = report.imported,
            updated = report.updated,
            skipped = report.skipped,
            errors = report.errors.len(),
            "bulk import finished"
        );
        report
    }

    fn apply(&self, store: &CatalogStore, item: &CatalogItem, directive: ImportDirective) -> Result<Applied> {
        debug!(?directive, name = %item.name, "applying import directive");

        match directive {
            ImportDirective::Skip => Ok(Applied::Skipped),

            ImportDirective::Import => {
                item.validate()?;
                insert_new(store, item)?;
                Ok(Applied::Imported)
            }

            ImportDirective::Update { target_id } => {
                item.validate()?;
                store.put_item(target_id, item)?;
                store.record_event(
                    "item_updated",
                    "item",
                    target_id,
                    serde_json::json!({"name": item.name, "source": "bulk_import"}),
                    ACTOR,
                );
                Ok(Applied::Updated)
            }

            ImportDirective::DeleteAndImport { target_id } => {
                // Validate before deleting so a bad row cannot remove the target
                item.validate()?;
                store.delete_item(target_id)?;
                store.record_event(
                    "item_deleted",
                    "item",
                    target_id,
                    serde_json::json!({"source": "bulk_import"}),
                    ACTOR,
                );
                insert_new(store, item)?;
                Ok(Applied::Imported)
            }

            ImportDirective::Merge { target_id } => {
                let existing = store.require_item(target_id)?;
                let merged = self.merger.merge_override(&existing, item);
                merged.validate()?;
                store.put_item(target_id, &merged)?;
                store.record_event(
                    "item_merged",
                    "item",
                    target_id,
                    serde_json::json!({
                        "name": merged.name,
                        "previous_price": existing.price,
                        "price": merged.price,
                        "source": "bulk_import",
                    }),
                    ACTOR,
                );
                Ok(Applied::Updated)
            }
        }
    }
}

/// Parse raw JSON rows at the boundary; failures surface per index in the report
pub fn parse_items(values: &[Value]) -> Vec<Result<CatalogItem>> {
    values
        .iter()
        .map(|v| {
            serde_json::from_value::<crate::item::RawItem>(v.clone())
                .map_err(CatalogError::from)
                .and_then(CatalogItem::try_from)
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
