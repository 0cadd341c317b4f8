// 📚 Catalog - the interface collaborators (UI, import tooling) call into
//
// An explicitly constructed handle: the caller opens it, passes it where it is
// needed and drops it to close the store. There is no shared default instance.

use crate::bill::Bill;
use crate::cleanup::{CleanupPass, CleanupReport};
use crate::config::CatalogConfig;
use crate::db::{CatalogStore, Event};
use crate::deduplication::{BatchDuplicateReport, DuplicateCheck, DuplicateDetector};
use crate::error::Result;
use crate::item::CatalogItem;
use crate::merge::MergeEngine;
use crate::normalize::DedupKey;
use crate::policy::{insert_new, InsertOutcome, InsertionPolicy, ACTOR};
use crate::reconciliation::{parse_items, BulkImportReport, BulkReconciler, DirectiveMap};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;

pub struct Catalog {
    store: CatalogStore,
    system_version: String,
    detector: DuplicateDetector,
    policy: InsertionPolicy,
    reconciler: BulkReconciler,
    cleanup: CleanupPass,
    merger: MergeEngine,
}

impl Catalog {
    pub fn new(store: CatalogStore) -> Self {
        Catalog {
            store,
            system_version: crate::VERSION.to_string(),
            detector: DuplicateDetector::new(),
            policy: InsertionPolicy::new(),
            reconciler: BulkReconciler::new(),
            cleanup: CleanupPass::new(),
            merger: MergeEngine::new(),
        }
    }

    pub fn open(config: &CatalogConfig) -> Result<Self> {
        let store = CatalogStore::open(&config.database_path, config.wal)?;
        Ok(Self::new(store).with_system_version(&config.system_version))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(CatalogStore::open_in_memory()?))
    }

    pub fn with_system_version(mut self, version: &str) -> Self {
        self.system_version = version.to_string();
        self
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn get_all_items(&self, category: Option<&str>) -> Result<Vec<CatalogItem>> {
        match category {
            Some(category) => self.store.items_by_category(category),
            None => self.store.all_items(),
        }
    }

    pub fn get_item_by_id(&self, id: i64) -> Result<Option<CatalogItem>> {
        self.store.get_item(id)
    }

    pub fn get_system_items(&self) -> Result<Vec<CatalogItem>> {
        self.store.items_by_system_flag(true)
    }

    pub fn get_user_items(&self) -> Result<Vec<CatalogItem>> {
        self.store.items_by_system_flag(false)
    }

    pub fn get_categories(&self) -> Result<Vec<String>> {
        self.store.categories()
    }

    pub fn get_events_for_item(&self, id: i64) -> Result<Vec<Event>> {
        self.store.events_for_entity("item", &id.to_string())
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Strict add: DuplicateRecord on an exact match
    pub fn add_item(&self, item: &CatalogItem) -> Result<i64> {
        self.policy.add_item(&self.store, item)
    }

    /// Lenient add: exact matches are merged unless `allow_duplicates`
    pub fn add_item_with_duplicate_handling(
        &self,
        item: &CatalogItem,
        allow_duplicates: bool,
    ) -> Result<InsertOutcome> {
        self.policy.insert_with_policy(&self.store, item, allow_duplicates)
    }

    /// Full replace keyed on `item.id`
    pub fn update_item(&self, item: &CatalogItem) -> Result<()> {
        item.validate()?;
        let id = item.require_id()?;
        self.store.put_item(id, item)?;
        self.store.record_event(
            "item_updated",
            "item",
            id,
            serde_json::json!({"name": item.name, "category": item.category, "price": item.price}),
            ACTOR,
        );
        Ok(())
    }

    pub fn delete_item(&self, id: i64) -> Result<()> {
        self.store.delete_item(id)?;
        self.store
            .record_event("item_deleted", "item", id, serde_json::json!({}), ACTOR);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Duplicate handling
    // ------------------------------------------------------------------------

    pub fn check_for_duplicate_item(&self, item: &CatalogItem) -> Result<DuplicateCheck> {
        Ok(self.detector.detect_in_store(&self.store, item)?.into())
    }

    pub fn check_duplicates(&self, items: &[CatalogItem]) -> Result<BatchDuplicateReport> {
        let existing = self.store.all_items()?;
        self.detector.check_batch(items, &existing)
    }

    pub fn bulk_import(&self, items: &[CatalogItem], directives: &DirectiveMap) -> BulkImportReport {
        self.reconciler.bulk_import(&self.store, items, directives)
    }

    /// Bulk import straight from loosely typed JSON rows
    pub fn bulk_import_json(&self, rows: &[Value], directives: &DirectiveMap) -> BulkImportReport {
        self.bulk_import_parsed(parse_items(rows), directives)
    }

    /// Bulk import where rows that failed boundary parsing count as per-item errors
    pub fn bulk_import_parsed(
        &self,
        rows: Vec<Result<CatalogItem>>,
        directives: &DirectiveMap,
    ) -> BulkImportReport {
        self.reconciler.run(&self.store, rows, directives)
    }

    pub fn cleanup_duplicates(&self) -> Result<CleanupReport> {
        self.cleanup.run(&self.store)
    }

    // ------------------------------------------------------------------------
    // System data
    // ------------------------------------------------------------------------

    /// Load vendor baseline rows. The batch is deduplicated by key first (later
    /// rows fold into earlier ones), then inserted without catalog checks.
    pub fn import_system_data(&self, items: &[CatalogItem], version: &str) -> Result<usize> {
        let now = Utc::now();
        let mut order: Vec<DedupKey> = Vec::new();
        let mut unique: HashMap<DedupKey, CatalogItem> = HashMap::new();

        for item in items {
            item.validate()?;
            let key = DedupKey::of(item);
            match unique.get_mut(&key) {
                Some(existing) => *existing = self.merger.merge(existing, item),
                None => {
                    order.push(key.clone());
                    unique.insert(key, item.clone());
                }
            }
        }

        let mut inserted = 0;
        for key in order {
            let Some(mut item) = unique.remove(&key) else {
                continue;
            };
            item.mark_system(version, now);
            insert_new(&self.store, &item)?;
            inserted += 1;
        }

        info!(inserted, version, "system data imported");
        Ok(inserted)
    }

    /// System import stamped with the configured version
    pub fn import_system_data_default(&self, items: &[CatalogItem]) -> Result<usize> {
        let version = self.system_version.clone();
        self.import_system_data(items, &version)
    }

    pub fn clear_system_data(&self) -> Result<usize> {
        let removed = self.store.delete_system_items()?;
        info!(removed, "system data cleared");
        Ok(removed)
    }

    // ------------------------------------------------------------------------
    // Bills
    // ------------------------------------------------------------------------

    pub fn save_bill(&self, bill: &Bill) -> Result<i64> {
        let mut bill = bill.clone();
        bill.stamp(Utc::now());
        let id = self.store.insert_bill(&bill)?;
        self.store.record_event(
            "bill_saved",
            "bill",
            id,
            serde_json::json!({"bill_number": bill.bill_number}),
            ACTOR,
        );
        Ok(id)
    }

    pub fn get_bills(&self) -> Result<Vec<Bill>> {
        self.store.all_bills()
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("system_version", &self.system_version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::policy::InsertStatus;

    #[test]
    fn test_update_requires_existing_id() {
        let catalog = Catalog::open_in_memory().unwrap();

        let err = catalog.update_item(&CatalogItem::new("Room", "Ward")).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidRecord(_)));

        let err = catalog
            .update_item(&CatalogItem::new("Room", "Ward").with_id(12))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_and_delete_are_audited() {
        let catalog = Catalog::open_in_memory().unwrap();
        let id = catalog.add_item(&CatalogItem::new("Room", "Ward")).unwrap();

        catalog
            .update_item(&CatalogItem::new("Room", "Ward").with_id(id).with_price(700.0))
            .unwrap();
        catalog.delete_item(id).unwrap();

        let kinds: Vec<String> = catalog
            .get_events_for_item(id)
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(kinds, vec!["item_deleted", "item_updated", "item_added"]);
        assert!(catalog.get_item_by_id(id).unwrap().is_none());
    }

    #[test]
    fn test_category_filter() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.add_item(&CatalogItem::new("CBC", "Lab")).unwrap();
        catalog.add_item(&CatalogItem::new("Room", "Ward")).unwrap();

        assert_eq!(catalog.get_all_items(Some("Lab")).unwrap().len(), 1);
        assert_eq!(catalog.get_all_items(None).unwrap().len(), 2);
        assert_eq!(catalog.get_categories().unwrap(), vec!["Lab", "Ward"]);
    }

    #[test]
    fn test_system_import_dedups_batch_and_stamps() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog
            .add_item(&CatalogItem::new("Paracetamol", "Medicine").with_price(4.0))
            .unwrap();

        let batch = vec![
            CatalogItem::new("Paracetamol", "Medicine").with_price(5.0),
            CatalogItem::new("paracetamol", "medicine").with_price(6.0).with_strength("500mg"),
            CatalogItem::new("CBC", "Lab").with_price(300.0),
        ];

        let inserted = catalog.import_system_data(&batch, "2024.3").unwrap();
        assert_eq!(inserted, 2);

        let system = catalog.get_system_items().unwrap();
        assert_eq!(system.len(), 2);
        assert_eq!(system[0].name, "Paracetamol");
        assert_eq!(system[0].price, 6.0);
        assert_eq!(system[0].strength, "500mg");
        assert!(system
            .iter()
            .all(|i| i.system_version.as_deref() == Some("2024.3") && i.last_updated.is_some()));

        // User row sharing the key is left alone
        assert_eq!(catalog.get_user_items().unwrap().len(), 1);

        assert_eq!(catalog.clear_system_data().unwrap(), 2);
        assert_eq!(catalog.get_all_items(None).unwrap().len(), 1);
    }

    #[test]
    fn test_system_import_uses_configured_version() {
        let catalog = Catalog::open_in_memory().unwrap().with_system_version("vendor-7");
        catalog
            .import_system_data_default(&[CatalogItem::new("Room", "Ward")])
            .unwrap();

        let system = catalog.get_system_items().unwrap();
        assert_eq!(system[0].system_version.as_deref(), Some("vendor-7"));
    }

    #[test]
    fn test_bulk_import_json_rows() {
        let catalog = Catalog::open_in_memory().unwrap();
        let rows = vec![
            serde_json::json!({"name": "CBC", "category": "Lab", "price": "300"}),
            serde_json::json!({"name": "ECG", "category": "Lab", "price": -5}),
        ];
        let directives = crate::reconciliation::parse_directives(&serde_json::json!({
            "0": {"action": "import"},
            "1": {"action": "import"}
        }));

        let report = catalog.bulk_import_json(&rows, &directives);

        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.errors[0].starts_with("Item 1: Invalid record"));
    }

    #[test]
    fn test_bills_are_stamped() {
        let catalog = Catalog::open_in_memory().unwrap();
        let id = catalog
            .save_bill(&Bill::new(serde_json::json!({"lines": []})).with_number("INV-9"))
            .unwrap();

        let bills = catalog.get_bills().unwrap();
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].id, Some(id));
        assert_eq!(bills[0].date, Utc::now().format("%Y-%m-%d").to_string());

        let err = catalog
            .save_bill(&Bill::new(serde_json::json!({})).with_number("INV-9"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateBill(_)));
    }

    #[test]
    fn test_lenient_add_reports_status() {
        let catalog = Catalog::open_in_memory().unwrap();
        let first = catalog
            .add_item_with_duplicate_handling(&CatalogItem::new("CBC", "Lab"), false)
            .unwrap();
        let second = catalog
            .add_item_with_duplicate_handling(&CatalogItem::new("cbc", "lab").with_price(250.0), false)
            .unwrap();

        assert_eq!(first.status, InsertStatus::Inserted);
        assert_eq!(second.status, InsertStatus::Merged);
        assert_eq!(second.id, first.id);
    }
}
