// 🧾 Catalog Item - billable line items (pharmacy, lab, room charges, imaging)
//
// Items arrive loosely typed (JSON from the UI, CSV rows from imports).
// `RawItem` is that wire shape; `CatalogItem::try_from(RawItem)` is the only
// place numeric fields are coerced. Past that point a price is a plain f64 >= 0.

use crate::error::{CatalogError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// X-RAY PRICING
// ============================================================================

/// Per-view sub-prices for imaging items. Missing views are 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct XrayPricing {
    #[serde(default)]
    pub ap: f64,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub oblique: f64,
    #[serde(default)]
    pub both: f64,
}

impl XrayPricing {
    pub fn new(ap: f64, lat: f64, oblique: f64, both: f64) -> Self {
        XrayPricing { ap, lat, oblique, both }
    }

    /// Field-wise maximum
    pub fn max(&self, other: &XrayPricing) -> XrayPricing {
        XrayPricing {
            ap: self.ap.max(other.ap),
            lat: self.lat.max(other.lat),
            oblique: self.oblique.max(other.oblique),
            both: self.both.max(other.both),
        }
    }
}

// ============================================================================
// CATALOG ITEM
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawItem")]
pub struct CatalogItem {
    /// Store-assigned id; None until persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    pub category: String,

    pub name: String,

    /// Empty string means unset
    #[serde(rename = "type")]
    pub item_type: String,

    pub quantity: String,

    pub strength: String,

    /// 0 means unset
    pub price: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub xray_pricing: Option<XrayPricing>,

    pub is_system_data: bool,

    // Provenance, only set on system-data writes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl CatalogItem {
    /// Create an unsaved user item with the two identity fields set
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        CatalogItem {
            id: None,
            category: category.into(),
            name: name.into(),
            item_type: String::new(),
            quantity: String::new(),
            strength: String::new(),
            price: 0.0,
            xray_pricing: None,
            is_system_data: false,
            system_version: None,
            last_updated: None,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub fn with_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = item_type.into();
        self
    }

    pub fn with_quantity(mut self, quantity: impl Into<String>) -> Self {
        self.quantity = quantity.into();
        self
    }

    pub fn with_strength(mut self, strength: impl Into<String>) -> Self {
        self.strength = strength.into();
        self
    }

    pub fn with_xray(mut self, xray: XrayPricing) -> Self {
        self.xray_pricing = Some(xray);
        self
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Mark as vendor baseline data and stamp provenance
    pub fn mark_system(&mut self, version: &str, at: DateTime<Utc>) {
        self.is_system_data = true;
        self.system_version = Some(version.to_string());
        self.last_updated = Some(at);
    }

    /// Name and category must be non-empty for any dedup comparison or write
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::invalid("name is required"));
        }
        if self.category.trim().is_empty() {
            return Err(CatalogError::invalid("category is required"));
        }
        Ok(())
    }

    /// Persisted id; an unsaved item is an invalid target
    pub fn require_id(&self) -> Result<i64> {
        self.id.ok_or_else(|| CatalogError::invalid("item has no id"))
    }

    pub fn has_price(&self) -> bool {
        self.price > 0.0
    }
}

// ============================================================================
// RAW ITEM (boundary shape)
// ============================================================================

/// Loosely typed item as it arrives from JSON or CSV
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawItem {
    pub id: Option<i64>,
    pub category: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type", alias = "item_type")]
    pub item_type: Option<String>,
    pub quantity: Option<String>,
    pub strength: Option<String>,
    pub price: Option<Value>,
    #[serde(alias = "xray_pricing")]
    pub xray_pricing: Option<RawXrayPricing>,
    #[serde(alias = "is_system_data")]
    pub is_system_data: Option<bool>,
    #[serde(alias = "system_version")]
    pub system_version: Option<String>,
    #[serde(alias = "last_updated")]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawXrayPricing {
    pub ap: Option<Value>,
    pub lat: Option<Value>,
    pub oblique: Option<Value>,
    pub both: Option<Value>,
}

impl TryFrom<RawXrayPricing> for XrayPricing {
    type Error = CatalogError;

    fn try_from(raw: RawXrayPricing) -> Result<Self> {
        Ok(XrayPricing {
            ap: parse_amount("xrayPricing.ap", raw.ap.as_ref())?,
            lat: parse_amount("xrayPricing.lat", raw.lat.as_ref())?,
            oblique: parse_amount("xrayPricing.oblique", raw.oblique.as_ref())?,
            both: parse_amount("xrayPricing.both", raw.both.as_ref())?,
        })
    }
}

impl TryFrom<RawItem> for CatalogItem {
    type Error = CatalogError;

    fn try_from(raw: RawItem) -> Result<Self> {
        let xray_pricing = raw.xray_pricing.map(XrayPricing::try_from).transpose()?;

        Ok(CatalogItem {
            id: raw.id,
            category: raw.category.unwrap_or_default(),
            name: raw.name.unwrap_or_default(),
            item_type: raw.item_type.unwrap_or_default(),
            quantity: raw.quantity.unwrap_or_default(),
            strength: raw.strength.unwrap_or_default(),
            price: parse_amount("price", raw.price.as_ref())?,
            xray_pricing,
            is_system_data: raw.is_system_data.unwrap_or(false),
            system_version: raw.system_version,
            last_updated: raw.last_updated,
        })
    }
}

/// Coerce a loosely typed amount to a non-negative f64.
/// Null, missing and blank strings are 0 (unset).
pub fn parse_amount(field: &str, value: Option<&Value>) -> Result<f64> {
    let amount = match value {
        None | Some(Value::Null) => return Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| CatalogError::invalid(format!("{field}: not a number")))?,
        Some(Value::String(s)) => parse_amount_str(field, s)?,
        Some(other) => {
            return Err(CatalogError::invalid(format!(
                "{field}: expected a number, got {other}"
            )))
        }
    };

    check_amount(field, amount)
}

/// Same coercion for a text cell (CSV)
pub fn parse_amount_str(field: &str, s: &str) -> Result<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    let amount: f64 = trimmed
        .parse()
        .map_err(|_| CatalogError::invalid(format!("{field}: '{trimmed}' is not a number")))?;

    check_amount(field, amount)
}

fn check_amount(field: &str, amount: f64) -> Result<f64> {
    if !amount.is_finite() {
        return Err(CatalogError::invalid(format!("{field}: must be finite")));
    }
    if amount < 0.0 {
        return Err(CatalogError::invalid(format!(
            "{field}: must be non-negative, got {amount}"
        )));
    }
    Ok(amount)
}

// ============================================================================
// TESTS
// ============================================================================
