// 📂 CSV loader - catalog rows → CatalogItem
//
// Columns: category, name, type, quantity, strength, price,
//          xray_ap, xray_lat, xray_oblique, xray_both (all xray columns optional)
// A file that cannot be read fails as a whole; a malformed row fails on its own.

use crate::error::{CatalogError, Result as ItemResult};
use crate::item::{parse_amount_str, CatalogItem, XrayPricing};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CsvRow {
    category: String,
    name: String,
    #[serde(rename = "type")]
    item_type: String,
    quantity: String,
    strength: String,
    price: String,
    xray_ap: Option<String>,
    xray_lat: Option<String>,
    xray_oblique: Option<String>,
    xray_both: Option<String>,
}

impl CsvRow {
    fn into_item(self) -> ItemResult<CatalogItem> {
        let xray_cells = [&self.xray_ap, &self.xray_lat, &self.xray_oblique, &self.xray_both];
        let has_xray = xray_cells
            .iter()
            .any(|cell| cell.as_deref().is_some_and(|s| !s.trim().is_empty()));

        let xray_pricing = if has_xray {
            Some(XrayPricing {
                ap: cell_amount("xray_ap", &self.xray_ap)?,
                lat: cell_amount("xray_lat", &self.xray_lat)?,
                oblique: cell_amount("xray_oblique", &self.xray_oblique)?,
                both: cell_amount("xray_both", &self.xray_both)?,
            })
        } else {
            None
        };

        let mut item = CatalogItem::new(self.name, self.category)
            .with_type(self.item_type)
            .with_quantity(self.quantity)
            .with_strength(self.strength)
            .with_price(parse_amount_str("price", &self.price)?);
        item.xray_pricing = xray_pricing;
        Ok(item)
    }
}

fn cell_amount(field: &str, cell: &Option<String>) -> ItemResult<f64> {
    parse_amount_str(field, cell.as_deref().unwrap_or(""))
}

pub fn load_csv(csv_path: &Path) -> Result<Vec<ItemResult<CatalogItem>>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;
    read_items(file)
}

/// One entry per data row, in file order
pub fn read_items<R: Read>(reader: R) -> Result<Vec<ItemResult<CatalogItem>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(reader);

    let mut items = Vec::new();

    for result in rdr.deserialize::<CsvRow>() {
        let row = result.context("Failed to deserialize catalog row")?;
        items.push(row.into_item());
    }

    Ok(items)
}

/// Loaded rows split into parsed items and failures, each tagged with its
/// 1-based data row number
pub fn split_rows(
    rows: Vec<ItemResult<CatalogItem>>,
) -> (Vec<(usize, CatalogItem)>, Vec<(usize, CatalogError)>) {
    let mut items = Vec::new();
    let mut failures = Vec::new();

    for (index, row) in rows.into_iter().enumerate() {
        match row {
            Ok(item) => items.push((index + 1, item)),
            Err(e) => failures.push((index + 1, e)),
        }
    }

    (items, failures)
}
