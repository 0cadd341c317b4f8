// 🧹 Cleanup Pass - collapse every duplicate cluster into one survivor
//
// Survivor = lowest id in the cluster. Everyone else is folded into it in
// ascending id order, the survivor is written once, then the rest are deleted.
// Not atomic across the sweep: assumes a single writer.

use crate::db::CatalogStore;
use crate::error::Result;
use crate::item::CatalogItem;
use crate::merge::MergeEngine;
use crate::normalize::DedupKey;
use crate::policy::ACTOR;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub duplicates_removed: usize,
    pub items_merged: usize,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Items grouped by dedup key; only groups with more than one member, each sorted by id
pub fn duplicate_clusters(items: Vec<CatalogItem>) -> Vec<Vec<CatalogItem>> {
    let mut groups: BTreeMap<DedupKey, Vec<CatalogItem>> = BTreeMap::new();
    for item in items {
        groups.entry(DedupKey::of(&item)).or_default().push(item);
    }

    groups
        .into_values()
        .filter(|group| group.len() > 1)
        .map(|mut group| {
            group.sort_by_key(|item| item.id);
            group
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupPass {
    merger: MergeEngine,
}

impl CleanupPass {
    pub fn new() -> Self {
        CleanupPass {
            merger: MergeEngine::new(),
        }
    }

    pub fn run(&self, store: &CatalogStore) -> Result<CleanupReport> {
        let clusters = duplicate_clusters(store.all_items()?);
        let mut report = CleanupReport::default();

        for cluster in &clusters {
            let Some((survivor, rest)) = cluster.split_first() else {
                continue;
            };
            let survivor_id = survivor.require_id()?;
            let folded = self.merger.fold(survivor, rest);

            if let Err(e) = store.put_item(survivor_id, &folded) {
                // Survivor untouched means the others must stay too
                warn!(survivor_id, error = %e, "cleanup could not update survivor");
                report.errors.push(format!("Item {survivor_id}: {e}"));
                continue;
            }
            report.items_merged += rest.len();

            let mut removed_ids = Vec::with_capacity(rest.len());
            for duplicate in rest {
                let Some(id) = duplicate.id else { continue };
                match store.delete_item(id) {
                    Ok(()) => {
                        report.duplicates_removed += 1;
                        removed_ids.push(id);
                    }
                    Err(e) => {
                        warn!(id, survivor_id, error = %e, "cleanup could not delete duplicate");
                        report.errors.push(format!("Item {id}: {e}"));
                    }
                }
            }

            store.record_event(
                "cleanup_merged",
                "item",
                survivor_id,
                serde_json::json!({
                    "name": folded.name,
                    "category": folded.category,
                    "removed_ids": removed_ids,
                    "price": folded.price,
                }),
                ACTOR,
            );
        }

        report.message = if clusters.is_empty() {
            "No duplicates found".to_string()
        } else {
            format!(
                "Merged {} duplicate items into {} survivors, removed {}",
                report.items_merged,
                clusters.len(),
                report.duplicates_removed
            )
        };
        info!(
            clusters = clusters.len(),
            items_merged = report.items_merged,
            duplicates_removed = report.duplicates_removed,
            "cleanup pass finished"
        );

        Ok(report)
    }
}
