use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::TransferAuditEntry,
    error::{AppError, Result},
    repository::TransferAuditRepository,
};

#[derive(FromRow)]
struct TransferRow {
    id: String,
    stripe_event_id: String,
    event_type: String,
    transfer_id: String,
    amount_cents: i64,
    destination: Option<String>,
    received_at: NaiveDateTime,
}

pub struct SqliteTransferAuditRepository {
    pool: SqlitePool,
}

impl SqliteTransferAuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransferAuditRepository for SqliteTransferAuditRepository {
    async fn record(&self, entry: TransferAuditEntry) -> Result<bool> {
        // Redelivered events hit the unique index on stripe_event_id.
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO transfer_events (
                id, stripe_event_id, event_type, transfer_id,
                amount_cents, destination, received_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(&entry.stripe_event_id)
        .bind(&entry.event_type)
        .bind(&entry.transfer_id)
        .bind(entry.amount_cents)
        .bind(&entry.destination)
        .bind(entry.received_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<TransferAuditEntry>> {
        let rows = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT id, stripe_event_id, event_type, transfer_id,
                   amount_cents, destination, received_at
            FROM transfer_events
            ORDER BY received_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                Ok(TransferAuditEntry {
                    id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
                    stripe_event_id: row.stripe_event_id,
                    event_type: row.event_type,
                    transfer_id: row.transfer_id,
                    amount_cents: row.amount_cents,
                    destination: row.destination,
                    received_at: DateTime::from_naive_utc_and_offset(row.received_at, Utc),
                })
            })
            .collect()
    }
}
