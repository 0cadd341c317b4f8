// End-to-end catalog behavior through the public API

use billing_catalog::{
    Catalog, CatalogError, CatalogItem, DirectiveMap, ImportDirective, InsertStatus, MergeEngine,
    XrayPricing,
};

fn catalog() -> Catalog {
    Catalog::open_in_memory().unwrap()
}

fn xray_item(name: &str, price: f64, xray: XrayPricing) -> CatalogItem {
    CatalogItem::new(name, "X-Ray").with_price(price).with_xray(xray)
}

// ============================================================================
// MERGE
// ============================================================================

#[test]
fn merge_keeps_base_identity() {
    let merger = MergeEngine::new();
    let a = CatalogItem::new("Chest", "X-Ray").with_id(3).with_price(100.0);
    let b = CatalogItem::new("chest ", "x-ray").with_id(9).with_price(150.0);

    let merged = merger.merge(&a, &b);

    assert_eq!(merged.id, Some(3));
    assert_eq!(merged.name, "Chest");
    assert_eq!(merged.category, "X-Ray");
    assert!(merged.validate().is_ok());
}

#[test]
fn merge_is_idempotent() {
    let merger = MergeEngine::new();
    let a = xray_item("Chest", 250.0, XrayPricing::new(300.0, 0.0, 120.0, 550.0))
        .with_id(1)
        .with_strength("2 views");

    assert_eq!(merger.merge(&a, &a), a);
}

#[test]
fn merge_price_and_xray_commute() {
    let merger = MergeEngine::new();
    let a = xray_item("Chest", 250.0, XrayPricing::new(300.0, 0.0, 120.0, 0.0)).with_id(1);
    let b = xray_item("chest", 200.0, XrayPricing::new(280.0, 90.0, 0.0, 550.0)).with_id(2);

    let ab = merger.merge(&a, &b);
    let ba = merger.merge(&b, &a);

    assert_eq!(ab.price, ba.price);
    assert_eq!(ab.xray_pricing, ba.xray_pricing);
    assert_eq!(ab.xray_pricing, Some(XrayPricing::new(300.0, 90.0, 120.0, 550.0)));
}

#[test]
fn fold_order_does_not_change_prices() {
    let merger = MergeEngine::new();
    let a = xray_item("Chest", 250.0, XrayPricing::new(300.0, 0.0, 0.0, 0.0)).with_id(1);
    let b = CatalogItem::new("chest", "X-Ray").with_id(2).with_price(0.0);
    let c = xray_item("CHEST", 180.0, XrayPricing::new(0.0, 90.0, 0.0, 500.0)).with_id(3);

    let orders = [
        [&a, &b, &c],
        [&a, &c, &b],
        [&b, &a, &c],
        [&b, &c, &a],
        [&c, &a, &b],
        [&c, &b, &a],
    ];

    for order in orders {
        let folded = merger.fold(order[0], order[1..].iter().copied());
        assert_eq!(folded.price, 250.0);
        assert_eq!(folded.xray_pricing, Some(XrayPricing::new(300.0, 90.0, 0.0, 500.0)));
    }
}

// ============================================================================
// INSERTION POLICY
// ============================================================================

#[test]
fn lenient_add_merges_whitespace_and_case_variants() {
    let catalog = catalog();
    let id = catalog
        .add_item(&CatalogItem::new("Paracetamol", "Medicine").with_price(5.0))
        .unwrap();

    let outcome = catalog
        .add_item_with_duplicate_handling(
            &CatalogItem::new("paracetamol ", " Medicine").with_price(8.0),
            false,
        )
        .unwrap();

    assert_eq!(outcome.status, InsertStatus::Merged);
    assert_eq!(outcome.id, id);

    let items = catalog.get_all_items(None).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].price, 8.0);
    assert_eq!(items[0].name, "Paracetamol");
}

#[test]
fn strict_add_rejects_exact_duplicate() {
    let catalog = catalog();
    let id = catalog
        .add_item(&CatalogItem::new("Paracetamol", "Medicine").with_price(5.0))
        .unwrap();

    let err = catalog
        .add_item(&CatalogItem::new("paracetamol ", " Medicine").with_price(8.0))
        .unwrap_err();

    match err {
        CatalogError::DuplicateRecord { existing_id, .. } => assert_eq!(existing_id, id),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(catalog.get_all_items(None).unwrap()[0].price, 5.0);
}

#[test]
fn allow_duplicates_inserts_a_second_row() {
    let catalog = catalog();
    catalog.add_item(&CatalogItem::new("CBC", "Lab")).unwrap();

    let outcome = catalog
        .add_item_with_duplicate_handling(&CatalogItem::new("cbc", "lab"), true)
        .unwrap();

    assert_eq!(outcome.status, InsertStatus::Inserted);
    assert_eq!(catalog.get_all_items(None).unwrap().len(), 2);
}

// ============================================================================
// BULK RECONCILIATION
// ============================================================================

#[test]
fn bulk_skip_import_merge() {
    let catalog = catalog();
    let existing = catalog
        .add_item(&CatalogItem::new("ECG", "Cardiology").with_price(150.0))
        .unwrap();

    let incoming = vec![
        CatalogItem::new("Room", "Ward").with_price(800.0),
        CatalogItem::new("CBC", "Lab").with_price(300.0),
        CatalogItem::new("ECG", "Cardiology").with_price(200.0),
    ];
    let mut directives = DirectiveMap::new();
    directives.insert(0, ImportDirective::Skip);
    directives.insert(1, ImportDirective::Import);
    directives.insert(2, ImportDirective::Merge { target_id: existing });

    let report = catalog.bulk_import(&incoming, &directives);

    assert_eq!(report.imported, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.skipped, 1);
    assert!(report.errors.is_empty());

    let ecg = catalog.get_item_by_id(existing).unwrap().unwrap();
    assert_eq!(ecg.price, 200.0);
    assert_eq!(catalog.get_all_items(None).unwrap().len(), 2);
}

#[test]
fn bulk_errors_do_not_abort_the_batch() {
    let catalog = catalog();
    let incoming = vec![
        CatalogItem::new("Room", "Ward"),
        CatalogItem::new("CBC", "Lab"),
    ];
    let mut directives = DirectiveMap::new();
    directives.insert(0, ImportDirective::Update { target_id: 404 });
    directives.insert(1, ImportDirective::Import);

    let report = catalog.bulk_import(&incoming, &directives);

    assert_eq!(report.imported, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("Item 0:"));
}

// ============================================================================
// CLEANUP
// ============================================================================

#[test]
fn cleanup_collapses_clusters() {
    let catalog = catalog();
    for (name, price) in [("Paracetamol", 5.0), ("paracetamol", 8.0), (" PARACETAMOL", 6.0)] {
        catalog
            .add_item_with_duplicate_handling(
                &CatalogItem::new(name, "Medicine").with_price(price),
                true,
            )
            .unwrap();
    }
    catalog.add_item(&CatalogItem::new("CBC", "Lab")).unwrap();
    catalog.add_item(&CatalogItem::new("Room", "Ward")).unwrap();

    let report = catalog.cleanup_duplicates().unwrap();

    assert_eq!(report.duplicates_removed, 2);
    assert_eq!(report.items_merged, 2);
    assert!(report.errors.is_empty());

    let items = catalog.get_all_items(None).unwrap();
    assert_eq!(items.len(), 3);
    let survivor = items.iter().find(|i| i.category == "Medicine").unwrap();
    assert_eq!(survivor.name, "Paracetamol");
    assert_eq!(survivor.price, 8.0);

    let again = catalog.cleanup_duplicates().unwrap();
    assert_eq!(again.duplicates_removed, 0);
    assert_eq!(again.message, "No duplicates found");
}

// ============================================================================
// SYSTEM / USER PARTITION
// ============================================================================

#[test]
fn system_and_user_items_partition_the_catalog() {
    let catalog = catalog();
    catalog.add_item(&CatalogItem::new("Custom Dressing", "Procedure")).unwrap();
    catalog
        .import_system_data(
            &[
                CatalogItem::new("CBC", "Lab").with_price(300.0),
                CatalogItem::new("Room", "Ward").with_price(800.0),
            ],
            "2024.1",
        )
        .unwrap();

    let all = catalog.get_all_items(None).unwrap();
    let system = catalog.get_system_items().unwrap();
    let user = catalog.get_user_items().unwrap();

    assert_eq!(system.len() + user.len(), all.len());

    let mut ids: Vec<i64> = system.iter().chain(user.iter()).filter_map(|i| i.id).collect();
    ids.sort_unstable();
    ids.dedup();
    let mut all_ids: Vec<i64> = all.iter().filter_map(|i| i.id).collect();
    all_ids.sort_unstable();
    assert_eq!(ids, all_ids);

    assert!(system.iter().all(|i| i.is_system_data));
    assert!(user.iter().all(|i| !i.is_system_data));
}
