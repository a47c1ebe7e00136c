pub mod dynamodb;
#[cfg(test)]
pub(crate) mod memory;
pub mod postgres;
pub mod store_writer;

pub use dynamodb::DynamoDbStore;
pub use postgres::PostgresStore;
pub use store_writer::StoreSink;

use seismic_client::domain::SeismicRecord;

/// Result of a conditional (insert-if-absent) write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Written,
    AlreadyExists,
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("table provisioning failed: {0}")]
    Provisioning(String),
    #[error("write failed: {0}")]
    Backend(String),
}

/// Key-value table of records keyed by `id`.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    fn table(&self) -> &str;

    /// Create the table if missing. Safe to call repeatedly.
    async fn ensure_table(&self) -> Result<(), StoreError>;

    /// Write `record` only if no item with its `id` exists. Never overwrites.
    async fn put_if_absent(&self, record: &SeismicRecord) -> Result<PutOutcome, StoreError>;
}
