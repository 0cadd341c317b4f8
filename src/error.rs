// ❗ Catalog errors
// One taxonomy for every layer: detector, merge, policy, store

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// Candidate is missing name/category, or a boundary value is malformed
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Strict add rejected because an exact match already exists
    #[error("Duplicate record: '{name}' in '{category}' already exists (id {existing_id})")]
    DuplicateRecord {
        name: String,
        category: String,
        existing_id: i64,
    },

    /// Bill number already used
    #[error("Bill number '{0}' already exists")]
    DuplicateBill(String),

    /// Referenced id does not exist
    #[error("Item {0} not found")]
    NotFound(i64),

    /// Underlying keyed store failed to open or respond (never retried here)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] rusqlite::Error),

    /// A persisted JSON column could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        CatalogError::InvalidRecord(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound(_))
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, CatalogError::DuplicateRecord { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CatalogError::DuplicateRecord {
            name: "Paracetamol".to_string(),
            category: "Medicine".to_string(),
            existing_id: 3,
        };
        assert!(err.is_duplicate());
        assert_eq!(
            err.to_string(),
            "Duplicate record: 'Paracetamol' in 'Medicine' already exists (id 3)"
        );

        let err = CatalogError::NotFound(42);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Item 42 not found");
    }

    #[test]
    fn test_store_error_converts() {
        let sqlite_err = rusqlite::Error::QueryReturnedNoRows;
        let err: CatalogError = sqlite_err.into();
        assert!(matches!(err, CatalogError::StoreUnavailable(_)));
    }
}
