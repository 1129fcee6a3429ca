//! In-memory multi-index tables plus a tagged-variant record log.

mod keys;
pub mod serde_u128;
mod table;
mod tagged;

pub use keys::{DIGEST_SUFFIX, Digest256, ExtFloat, F64Key, IndexKey, KeyDomain, SecondaryKey};
pub use table::{Row, Table, TableSchema};
pub use tagged::{MAX_BULK_ROWS, TaggedLog, TaggedRow, VariantValue};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("table '{table}' has no row matching {lookup}")]
    NotFound { table: String, lookup: String },
    #[error("table '{table}' constraint violated: {reason}")]
    ConstraintViolation { table: String, reason: String },
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("table '{table}' has no index named '{index}'")]
    UnknownIndex { table: String, index: String },
}

pub(crate) fn not_found(table: &str, lookup: impl Into<String>) -> StoreError {
    StoreError::NotFound {
        table: table.to_string(),
        lookup: lookup.into(),
    }
}

pub(crate) fn violation(table: &str, reason: impl Into<String>) -> StoreError {
    StoreError::ConstraintViolation {
        table: table.to_string(),
        reason: reason.into(),
    }
}
