// Billing Catalog - Core Library
// Local store for billable items with duplicate detection, merge and bulk reconciliation

pub mod error;
pub mod item;
pub mod bill;
pub mod normalize;
pub mod db;             // Keyed Store (SQLite)
pub mod deduplication;  // Duplicate Detector
pub mod merge;          // Merge Engine
pub mod policy;         // Insertion Policy
pub mod reconciliation; // Bulk Reconciliation
pub mod cleanup;        // Cleanup Pass
pub mod catalog;
pub mod config;
pub mod loader;
pub mod logging;

// Re-export commonly used types
pub use error::{CatalogError, Result};
pub use item::{CatalogItem, RawItem, XrayPricing};
pub use bill::Bill;
pub use normalize::DedupKey;
pub use db::{CatalogStore, Event, setup_database};
pub use deduplication::{
    DuplicateDetector, DuplicateMatches, DuplicateCheck, BatchDuplicate, BatchDuplicateReport,
};
pub use merge::MergeEngine;
pub use policy::{InsertionPolicy, InsertOutcome, InsertStatus};
pub use reconciliation::{
    BulkReconciler, BulkImportReport, ImportDirective, DirectiveMap, parse_directives,
};
pub use cleanup::{CleanupPass, CleanupReport};
pub use catalog::Catalog;
pub use config::CatalogConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
