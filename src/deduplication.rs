// 🔍 Duplicate Detector - partition existing items against a candidate
// Exact match: same dedup key. Similar match: same name, different category.

use crate::db::CatalogStore;
use crate::error::{CatalogError, Result};
use crate::item::CatalogItem;
use crate::normalize::DedupKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateMatches {
    pub exact_matches: Vec<CatalogItem>,
    pub similar_matches: Vec<CatalogItem>,
}

impl DuplicateMatches {
    pub fn has_exact(&self) -> bool {
        !self.exact_matches.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.exact_matches.is_empty() && self.similar_matches.is_empty()
    }

    /// Lowest-id exact match
    pub fn first_exact(&self) -> Option<&CatalogItem> {
        self.exact_matches.first()
    }
}

/// Single-item check as reported to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub exact_matches: Vec<CatalogItem>,
    pub similar_matches: Vec<CatalogItem>,
}

impl From<DuplicateMatches> for DuplicateCheck {
    fn from(matches: DuplicateMatches) -> Self {
        DuplicateCheck {
            is_duplicate: matches.has_exact(),
            exact_matches: matches.exact_matches,
            similar_matches: matches.similar_matches,
        }
    }
}

/// One batch entry that collided with the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDuplicate {
    pub index: usize,
    pub new_item: CatalogItem,
    pub exact_matches: Vec<CatalogItem>,
    pub similar_matches: Vec<CatalogItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchDuplicateReport {
    pub duplicates: Vec<BatchDuplicate>,
}

// ============================================================================
// DUPLICATE DETECTOR
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateDetector;

impl DuplicateDetector {
    pub fn new() -> Self {
        DuplicateDetector
    }

    /// Partition `existing` into exact and similar matches for `candidate`.
    /// Output keeps the order of `existing`.
    pub fn detect(&self, candidate: &CatalogItem, existing: &[CatalogItem]) -> Result<DuplicateMatches> {
        candidate.validate()?;
        let key = DedupKey::of(candidate);

        let mut matches = DuplicateMatches::default();
        for item in existing {
            let other = DedupKey::of(item);
            if other == key {
                matches.exact_matches.push(item.clone());
            } else if key.is_similar(&other) {
                matches.similar_matches.push(item.clone());
            }
        }

        Ok(matches)
    }

    /// Detect against the full catalog
    pub fn detect_in_store(&self, store: &CatalogStore, candidate: &CatalogItem) -> Result<DuplicateMatches> {
        candidate.validate()?;
        let existing = store.all_items()?;
        self.detect(candidate, &existing)
    }

    /// Pre-flight check for a whole batch; scans the catalog once.
    /// Only entries with at least one match are reported.
    pub fn check_batch(&self, candidates: &[CatalogItem], existing: &[CatalogItem]) -> Result<BatchDuplicateReport> {
        // Bucket by normalized name: both match kinds share it
        let mut by_name: HashMap<String, Vec<&CatalogItem>> = HashMap::new();
        for item in existing {
            by_name
                .entry(DedupKey::of(item).name)
                .or_default()
                .push(item);
        }

        let mut report = BatchDuplicateReport::default();

        for (index, candidate) in candidates.iter().enumerate() {
            if let Err(CatalogError::InvalidRecord(reason)) = candidate.validate() {
                return Err(CatalogError::invalid(format!("item {index}: {reason}")));
            }

            let key = DedupKey::of(candidate);
            let Some(bucket) = by_name.get(&key.name) else {
                continue;
            };

            let (exact, similar): (Vec<&CatalogItem>, Vec<&CatalogItem>) = bucket
                .iter()
                .copied()
                .partition(|item| DedupKey::of(item).category == key.category);

            report.duplicates.push(BatchDuplicate {
                index,
                new_item: candidate.clone(),
                exact_matches: exact.into_iter().cloned().collect(),
                similar_matches: similar.into_iter().cloned().collect(),
            });
        }

        Ok(report)
    }
}

// ============================================================================
// TESTS
// ============================================================================
