//! Append-only Observability / Audit Log.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::{LogEntry, LogFilter, LogLevel, NewLogEntry};

pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn log(&self, entry: NewLogEntry) -> AppResult<LogEntry> {
        let row = sqlx::query_as!(
            LogEntry,
            r#"
            INSERT INTO log_entries (level, message, device_id, source, stack_trace, additional_data)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, "timestamp", level as "level: LogLevel", message,
                      device_id, source, stack_trace, additional_data
            "#,
            entry.level as LogLevel,
            entry.message,
            entry.device_id,
            entry.source,
            entry.stack_trace,
            entry.additional_data
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn query(&self, filter: &LogFilter) -> AppResult<Vec<LogEntry>> {
        let rows = sqlx::query_as!(
            LogEntry,
            r#"
            SELECT id, "timestamp", level as "level: LogLevel", message,
                   device_id, source, stack_trace, additional_data
            FROM log_entries
            WHERE ($1::uuid IS NULL OR device_id = $1)
            AND ($2::log_level IS NULL OR level = $2)
            AND ($3::timestamptz IS NULL OR "timestamp" >= $3)
            AND ($4::timestamptz IS NULL OR "timestamp" <= $4)
            ORDER BY "timestamp" DESC
            LIMIT $5
            "#,
            filter.device_id,
            filter.level as Option<LogLevel>,
            filter.since,
            filter.until,
            filter.limit
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Deletes rows older than `before`; the caller runs this on a
    /// retention-window cadence.
    pub async fn compact(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query!("DELETE FROM log_entries WHERE \"timestamp\" < $1", before)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn device_log(
        &self,
        device_id: Uuid,
        level: LogLevel,
        message: impl Into<String>,
    ) -> AppResult<()> {
        self.log(NewLogEntry {
            level,
            message: message.into(),
            device_id: Some(device_id),
            source: Some("hub".to_string()),
            stack_trace: None,
            additional_data: None,
        })
        .await?;
        Ok(())
    }
}
