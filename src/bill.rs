// Bills are pass-through records: opaque payload, unique number, save-time stamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Unique; assigned as BILL-<id> when not supplied
    #[serde(default)]
    pub bill_number: Option<String>,

    /// Calendar date of save (YYYY-MM-DD)
    #[serde(default)]
    pub date: String,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Invoice content, not interpreted by the catalog
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Bill {
    pub fn new(payload: serde_json::Value) -> Self {
        Bill {
            id: None,
            bill_number: None,
            date: String::new(),
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn with_number(mut self, bill_number: impl Into<String>) -> Self {
        self.bill_number = Some(bill_number.into());
        self
    }

    /// Stamp date and timestamp at save time
    pub fn stamp(&mut self, now: DateTime<Utc>) {
        self.timestamp = now;
        self.date = now.format("%Y-%m-%d").to_string();
    }
}
