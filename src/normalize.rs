// Dedup key: lowercase(trim(name)) + lowercase(trim(category))

use crate::item::CatalogItem;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    pub name: String,
    pub category: String,
}

impl DedupKey {
    pub fn new(name: &str, category: &str) -> Self {
        DedupKey {
            name: normalize(name),
            category: normalize(category),
        }
    }

    pub fn of(item: &CatalogItem) -> Self {
        Self::new(&item.name, &item.category)
    }

    /// Same name, different category
    pub fn is_similar(&self, other: &DedupKey) -> bool {
        self.name == other.name && self.category != other.category
    }
}

pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}
