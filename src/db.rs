// 🗄️ Keyed Store - SQLite-backed items, bills and audit events
//
// Every public method is a single statement (atomic on its own). Composite
// operations built on top (merge-then-replace, cleanup) are not transactional.

use crate::bill::Bill;
use crate::error::{CatalogError, Result};
use crate::item::{CatalogItem, XrayPricing};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

const ITEM_COLUMNS: &str = "id, category, name, item_type, quantity, strength, price,
     xray_pricing, is_system_data, system_version, last_updated";

/// Event for audit trail: every catalog mutation is recorded
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection, wal: bool) -> Result<()> {
    // WAL for crash recovery; in-memory databases ignore it
    if wal {
        conn.pragma_update(None, "journal_mode", "WAL")?;
    }

    // ==========================================================================
    // Items Table (billable catalog)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category TEXT NOT NULL,
            name TEXT NOT NULL,
            item_type TEXT NOT NULL DEFAULT '',
            quantity TEXT NOT NULL DEFAULT '',
            strength TEXT NOT NULL DEFAULT '',
            price REAL NOT NULL DEFAULT 0,
            xray_pricing TEXT,
            is_system_data INTEGER NOT NULL DEFAULT 0,
            system_version TEXT,
            last_updated TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Bills Table (opaque payload)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS bills (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bill_number TEXT UNIQUE,
            date TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            payload TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_items_category ON items(category)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_items_system ON items(is_system_data)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// CATALOG STORE
// ============================================================================

/// Owned handle to the keyed store. Construct one and pass it to the `Catalog`.
pub struct CatalogStore {
    conn: Connection,
}

impl CatalogStore {
    pub fn open(path: &Path, wal: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|_| {
                    CatalogError::StoreUnavailable(rusqlite::Error::InvalidPath(
                        parent.to_path_buf(),
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        setup_database(&conn, wal)?;
        debug!(path = %path.display(), "catalog store opened");
        Ok(CatalogStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn, false)?;
        Ok(CatalogStore { conn })
    }

    // ------------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------------

    /// Insert as a new row; any id on the item is ignored
    pub fn insert_item(&self, item: &CatalogItem) -> Result<i64> {
        let xray_json = encode_xray(item.xray_pricing.as_ref())?;

        self.conn.execute(
            "INSERT INTO items (
                category, name, item_type, quantity, strength, price,
                xray_pricing, is_system_data, system_version, last_updated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                item.category,
                item.name,
                item.item_type,
                item.quantity,
                item.strength,
                item.price,
                xray_json,
                item.is_system_data,
                item.system_version,
                item.last_updated.map(|dt| dt.to_rfc3339()),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Full replace of the row at `id`
    pub fn put_item(&self, id: i64, item: &CatalogItem) -> Result<()> {
        let xray_json = encode_xray(item.xray_pricing.as_ref())?;

        let changed = self.conn.execute(
            "UPDATE items SET
                category = ?1, name = ?2, item_type = ?3, quantity = ?4, strength = ?5,
                price = ?6, xray_pricing = ?7, is_system_data = ?8,
                system_version = ?9, last_updated = ?10
             WHERE id = ?11",
            params![
                item.category,
                item.name,
                item.item_type,
                item.quantity,
                item.strength,
                item.price,
                xray_json,
                item.is_system_data,
                item.system_version,
                item.last_updated.map(|dt| dt.to_rfc3339()),
                id,
            ],
        )?;

        if changed == 0 {
            return Err(CatalogError::NotFound(id));
        }
        Ok(())
    }

    pub fn get_item(&self, id: i64) -> Result<Option<CatalogItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1");
        let item = self
            .conn
            .query_row(&sql, params![id], row_to_item)
            .optional()?;
        Ok(item)
    }

    pub fn require_item(&self, id: i64) -> Result<CatalogItem> {
        self.get_item(id)?.ok_or(CatalogError::NotFound(id))
    }

    /// All items, ascending id
    pub fn all_items(&self) -> Result<Vec<CatalogItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY id ASC");
        self.query_items(&sql, [])
    }

    /// Exact-category lookup through the category index
    pub fn items_by_category(&self, category: &str) -> Result<Vec<CatalogItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE category = ?1 ORDER BY id ASC");
        self.query_items(&sql, params![category])
    }

    pub fn items_by_system_flag(&self, is_system_data: bool) -> Result<Vec<CatalogItem>> {
        let sql =
            format!("SELECT {ITEM_COLUMNS} FROM items WHERE is_system_data = ?1 ORDER BY id ASC");
        self.query_items(&sql, params![is_system_data])
    }

    pub fn delete_item(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM items WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(CatalogError::NotFound(id));
        }
        Ok(())
    }

    pub fn delete_system_items(&self) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM items WHERE is_system_data = 1", [])?;
        Ok(removed)
    }

    pub fn categories(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT category FROM items ORDER BY category ASC")?;
        let categories = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(categories)
    }

    pub fn count_items(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count)
    }

    fn query_items<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<CatalogItem>> {
        let mut stmt = self.conn.prepare(sql)?;
        let items = stmt
            .query_map(params, row_to_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    // ------------------------------------------------------------------------
    // Bills
    // ------------------------------------------------------------------------

    /// Insert and number assignment commit together or not at all
    pub fn insert_bill(&self, bill: &Bill) -> Result<i64> {
        let payload = serde_json::to_string(&bill.payload)?;
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO bills (bill_number, date, timestamp, payload) VALUES (?1, ?2, ?3, ?4)",
            params![bill.bill_number, bill.date, bill.timestamp.to_rfc3339(), payload],
        )
        .map_err(|e| bill_error(e, bill.bill_number.as_deref().unwrap_or_default()))?;

        let id = tx.last_insert_rowid();

        if bill.bill_number.is_none() {
            let number = format!("BILL-{id}");
            tx.execute(
                "UPDATE bills SET bill_number = ?1 WHERE id = ?2",
                params![number, id],
            )
            .map_err(|e| bill_error(e, &number))?;
        }

        tx.commit()?;
        Ok(id)
    }

    pub fn all_bills(&self) -> Result<Vec<Bill>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, bill_number, date, timestamp, payload FROM bills ORDER BY id ASC",
        )?;

        let bills = stmt
            .query_map([], |row| {
                let timestamp_str: String = row.get(3)?;
                let payload_json: String = row.get(4)?;

                Ok(Bill {
                    id: Some(row.get(0)?),
                    bill_number: row.get(1)?,
                    date: row.get(2)?,
                    timestamp: parse_timestamp(3, &timestamp_str)?,
                    payload: serde_json::from_str(&payload_json)
                        .map_err(|e| conversion_error(4, e))?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(bills)
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    pub fn insert_event(&self, event: &Event) -> Result<()> {
        let data_json = serde_json::to_string(&event.data)?;

        self.conn.execute(
            "INSERT INTO events (
                event_id, timestamp, event_type, entity_type, entity_id, data, actor
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.event_id,
                event.timestamp.to_rfc3339(),
                event.event_type,
                event.entity_type,
                event.entity_id,
                data_json,
                event.actor,
            ],
        )?;

        Ok(())
    }

    /// Append an audit event; failures are logged, never returned
    pub fn record_event(
        &self,
        event_type: &str,
        entity_type: &str,
        entity_id: i64,
        data: serde_json::Value,
        actor: &str,
    ) {
        let event = Event::new(event_type, entity_type, &entity_id.to_string(), data, actor);
        if let Err(e) = self.insert_event(&event) {
            warn!(event_type, entity_id, error = %e, "failed to write audit event");
        }
    }

    /// Events for one entity, newest first
    pub fn events_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
             FROM events
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY id DESC",
        )?;

        let events = stmt
            .query_map(params![entity_type, entity_id], |row| {
                let timestamp_str: String = row.get(1)?;
                let data_json: String = row.get(5)?;

                Ok(Event {
                    event_id: row.get(0)?,
                    timestamp: parse_timestamp(1, &timestamp_str)?,
                    event_type: row.get(2)?,
                    entity_type: row.get(3)?,
                    entity_id: row.get(4)?,
                    data: serde_json::from_str(&data_json).map_err(|e| conversion_error(5, e))?,
                    actor: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<CatalogItem> {
    let xray_json: Option<String> = row.get(7)?;
    let xray_pricing = match xray_json {
        Some(json) => Some(
            serde_json::from_str::<XrayPricing>(&json).map_err(|e| conversion_error(7, e))?,
        ),
        None => None,
    };

    let last_updated_str: Option<String> = row.get(10)?;
    let last_updated = match last_updated_str {
        Some(s) => Some(parse_timestamp(10, &s)?),
        None => None,
    };

    Ok(CatalogItem {
        id: Some(row.get(0)?),
        category: row.get(1)?,
        name: row.get(2)?,
        item_type: row.get(3)?,
        quantity: row.get(4)?,
        strength: row.get(5)?,
        price: row.get(6)?,
        xray_pricing,
        is_system_data: row.get(8)?,
        system_version: row.get(9)?,
        last_updated,
    })
}

fn encode_xray(xray: Option<&XrayPricing>) -> Result<Option<String>> {
    Ok(xray.map(serde_json::to_string).transpose()?)
}

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn bill_error(e: rusqlite::Error, bill_number: &str) -> CatalogError {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            CatalogError::DuplicateBill(bill_number.to_string())
        }
        other => other.into(),
    }
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CatalogStore {
        CatalogStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_assigns_ascending_ids() {
        let store = store();
        let a = store.insert_item(&CatalogItem::new("Paracetamol", "Medicine")).unwrap();
        let b = store.insert_item(&CatalogItem::new("CBC", "Lab")).unwrap();

        assert!(b > a);
        assert_eq!(store.count_items().unwrap(), 2);
    }

    #[test]
    fn test_roundtrip_preserves_all_fields() {
        let store = store();
        let mut item = CatalogItem::new("Chest X-Ray", "X-Ray")
            .with_type("Digital")
            .with_quantity("1")
            .with_strength("")
            .with_price(450.0)
            .with_xray(XrayPricing::new(300.0, 250.0, 0.0, 500.0));
        item.mark_system("2024.1", Utc::now());

        let id = store.insert_item(&item).unwrap();
        let loaded = store.get_item(id).unwrap().unwrap();

        assert_eq!(loaded.id, Some(id));
        assert_eq!(loaded.item_type, "Digital");
        assert_eq!(loaded.price, 450.0);
        assert_eq!(loaded.xray_pricing, item.xray_pricing);
        assert!(loaded.is_system_data);
        assert_eq!(loaded.system_version.as_deref(), Some("2024.1"));
        assert!(loaded.last_updated.is_some());
    }

    #[test]
    fn test_get_missing_item() {
        let store = store();
        assert!(store.get_item(999).unwrap().is_none());
        assert!(store.require_item(999).unwrap_err().is_not_found());
    }

    #[test]
    fn test_put_and_delete_missing_are_not_found() {
        let store = store();
        let item = CatalogItem::new("Room", "Ward");

        assert!(store.put_item(5, &item).unwrap_err().is_not_found());
        assert!(store.delete_item(5).unwrap_err().is_not_found());
    }

    #[test]
    fn test_put_replaces_row() {
        let store = store();
        let id = store.insert_item(&CatalogItem::new("Room", "Ward").with_price(500.0)).unwrap();

        store
            .put_item(id, &CatalogItem::new("Private Room", "Ward").with_price(900.0))
            .unwrap();

        let loaded = store.require_item(id).unwrap();
        assert_eq!(loaded.name, "Private Room");
        assert_eq!(loaded.price, 900.0);
    }

    #[test]
    fn test_category_lookup_and_listing() {
        let store = store();
        store.insert_item(&CatalogItem::new("CBC", "Lab")).unwrap();
        store.insert_item(&CatalogItem::new("Lipid Panel", "Lab")).unwrap();
        store.insert_item(&CatalogItem::new("Room", "Ward")).unwrap();

        assert_eq!(store.items_by_category("Lab").unwrap().len(), 2);
        assert_eq!(store.items_by_category("Pharmacy").unwrap().len(), 0);
        assert_eq!(store.categories().unwrap(), vec!["Lab", "Ward"]);
    }

    #[test]
    fn test_bill_numbers() {
        let store = store();
        let id = store.insert_bill(&Bill::new(serde_json::json!({"total": 10}))).unwrap();
        store
            .insert_bill(&Bill::new(serde_json::json!({})).with_number("INV-1"))
            .unwrap();

        let bills = store.all_bills().unwrap();
        assert_eq!(bills.len(), 2);
        assert_eq!(bills[0].bill_number, Some(format!("BILL-{id}")));
        assert_eq!(bills[0].payload["total"], 10);

        let err = store
            .insert_bill(&Bill::new(serde_json::json!({})).with_number("INV-1"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateBill(_)));
    }

    #[test]
    fn test_generated_number_collision_leaves_no_row() {
        let store = store();
        // Takes id 1 but claims the number the next bill would be given
        store
            .insert_bill(&Bill::new(serde_json::json!({})).with_number("BILL-2"))
            .unwrap();

        let err = store.insert_bill(&Bill::new(serde_json::json!({}))).unwrap_err();
        match err {
            CatalogError::DuplicateBill(number) => assert_eq!(number, "BILL-2"),
            other => panic!("expected DuplicateBill, got {other}"),
        }

        let bills = store.all_bills().unwrap();
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].bill_number.as_deref(), Some("BILL-2"));
    }

    #[test]
    fn test_broken_store_is_unavailable() {
        let store = store();
        store.conn.execute_batch("DROP TABLE items").unwrap();

        let err = store.all_items().unwrap_err();
        assert!(matches!(err, CatalogError::StoreUnavailable(_)));

        let err = store.insert_item(&CatalogItem::new("CBC", "Lab")).unwrap_err();
        assert!(matches!(err, CatalogError::StoreUnavailable(_)));
    }

    #[test]
    fn test_event_log() {
        let store = store();
        store.record_event("item_added", "item", 7, serde_json::json!({"name": "CBC"}), "test");
        store.record_event("item_deleted", "item", 7, serde_json::json!({}), "test");

        let events = store.events_for_entity("item", "7").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "item_deleted");
        assert_eq!(events[1].data["name"], "CBC");
    }

    #[test]
    fn test_reopen_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.db");

        {
            let store = CatalogStore::open(&path, true).unwrap();
            store.insert_item(&CatalogItem::new("Room", "Ward")).unwrap();
        }

        let store = CatalogStore::open(&path, true).unwrap();
        assert_eq!(store.count_items().unwrap(), 1);
    }
}
