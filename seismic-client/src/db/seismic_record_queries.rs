use anyhow::{bail, Result};
use sqlx::PgPool;

use crate::domain::SeismicRecord;

/// Table names are interpolated into DDL/DML, so only plain identifiers pass.
pub fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let Some(first) = chars.next() else {
        bail!("table name is empty");
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        bail!("table name '{table}' must start with a letter or underscore");
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("table name '{table}' may only contain ASCII letters, digits and underscores");
    }
    Ok(())
}

/// Create the records table (keyed by `id`) and its `scraped_at` index if missing.
pub async fn ensure_schema(pool: &PgPool, table: &str) -> Result<()> {
    validate_table_name(table)?;

    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id                  TEXT PRIMARY KEY,
            code                TEXT,
            event_time_epoch_ms BIGINT,
            event_time_utc      TEXT,
            event_time_local    TEXT,
            latitude            NUMERIC NOT NULL,
            longitude           NUMERIC NOT NULL,
            magnitude           NUMERIC NOT NULL,
            magnitude_scale     TEXT,
            depth_km            NUMERIC,
            depth_category      TEXT,
            reference_place     TEXT,
            region              TEXT,
            intensity           TEXT,
            felt_report         TEXT,
            report_date         TEXT,
            report_time         TEXT,
            latest_flag         TEXT,
            report_flag         TEXT,
            scraped_at          TEXT NOT NULL,
            source_label        TEXT NOT NULL,
            source_url          TEXT NOT NULL
        )
        "#
    );
    sqlx::query(&ddl).execute(pool).await?;

    let index = format!("CREATE INDEX IF NOT EXISTS {table}_scraped_at_idx ON {table} (scraped_at)");
    sqlx::query(&index).execute(pool).await?;

    Ok(())
}

/// Insert a record unless a row with the same `id` exists.
///
/// Returns `true` when the row was inserted, `false` when the id was taken.
/// Existing rows are never updated.
pub async fn insert_if_absent(pool: &PgPool, table: &str, record: &SeismicRecord) -> Result<bool> {
    validate_table_name(table)?;

    let sql = format!(
        r#"
        INSERT INTO {table} (
            id, code, event_time_epoch_ms, event_time_utc, event_time_local,
            latitude, longitude, magnitude, magnitude_scale, depth_km,
            depth_category, reference_place, region, intensity, felt_report,
            report_date, report_time, latest_flag, report_flag,
            scraped_at, source_label, source_url
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
        ON CONFLICT (id) DO NOTHING
        "#
    );

    let result = sqlx::query(&sql)
        .bind(&record.id)
        .bind(&record.code)
        .bind(record.event_time_epoch_ms)
        .bind(&record.event_time_utc)
        .bind(&record.event_time_local)
        .bind(record.latitude)
        .bind(record.longitude)
        .bind(record.magnitude)
        .bind(&record.magnitude_scale)
        .bind(record.depth_km)
        .bind(&record.depth_category)
        .bind(&record.reference_place)
        .bind(&record.region)
        .bind(&record.intensity)
        .bind(&record.felt_report)
        .bind(&record.report_date)
        .bind(&record.report_time)
        .bind(&record.latest_flag)
        .bind(&record.report_flag)
        .bind(&record.scraped_at)
        .bind(&record.source_label)
        .bind(&record.source_url)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        assert!(validate_table_name("SismosIGP").is_ok());
        assert!(validate_table_name("_seismic_records_2").is_ok());
    }

    #[test]
    fn rejects_identifiers_that_would_need_quoting() {
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2records").is_err());
        assert!(validate_table_name("records; DROP TABLE x").is_err());
        assert!(validate_table_name("igp-sismos").is_err());
    }
}
