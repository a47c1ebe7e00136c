use seismic_client::{db::seismic_record_queries, domain::SeismicRecord};
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{PutOutcome, RecordStore, StoreError};

/// Postgres-compatible table written with `INSERT .. ON CONFLICT (id) DO NOTHING`.
pub struct PostgresStore {
    pool: PgPool,
    table: String,
}

impl PostgresStore {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self, StoreError> {
        let table = table.into();
        seismic_record_queries::validate_table_name(&table)
            .map_err(|e| StoreError::Provisioning(e.to_string()))?;
        Ok(Self { pool, table })
    }

    pub async fn connect(uri: &str, max_connections: u32, table: impl Into<String>) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(uri)
            .await
            .map_err(|e| StoreError::Provisioning(format!("failed to connect to postgres: {e}")))?;
        Self::new(pool, table)
    }
}

#[async_trait::async_trait]
impl RecordStore for PostgresStore {
    fn table(&self) -> &str {
        &self.table
    }

    async fn ensure_table(&self) -> Result<(), StoreError> {
        seismic_record_queries::ensure_schema(&self.pool, &self.table)
            .await
            .map_err(|e| StoreError::Provisioning(format!("{e:#}")))?;
        tracing::info!(table = %self.table, "table ready");
        Ok(())
    }

    async fn put_if_absent(&self, record: &SeismicRecord) -> Result<PutOutcome, StoreError> {
        let inserted = seismic_record_queries::insert_if_absent(&self.pool, &self.table, record)
            .await
            .map_err(|e| StoreError::Backend(format!("insert {}: {e:#}", record.id)))?;

        Ok(if inserted {
            PutOutcome::Written
        } else {
            PutOutcome::AlreadyExists
        })
    }
}
