//! PostgreSQL implementation of EventLogWriter.
//!
//! Batches live in `event_batches`, staged events in `event_log`. The
//! `seq` column of `event_log` preserves insertion order.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::domain::event_log::{BatchStatus, EventBatch, EventLogTuple, EventStatus};
use crate::domain::foundation::{BatchId, DomainError, ErrorCode, EventEnvelope, Timestamp};
use crate::ports::EventLogWriter;

/// PostgreSQL implementation of EventLogWriter.
#[derive(Clone)]
pub struct PostgresEventLog {
    pool: PgPool,
}

impl PostgresEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_events(
        tx: &mut Transaction<'_, Postgres>,
        events: &[EventLogTuple],
    ) -> Result<(), DomainError> {
        for event in events {
            let payload = serde_json::to_value(&event.event).map_err(|e| {
                DomainError::new(
                    ErrorCode::InternalError,
                    format!("Failed to serialize event envelope: {}", e),
                )
            })?;

            sqlx::query(
                r#"
                INSERT INTO event_log (
                    id, batch_id, event_type, target_stream, event, status,
                    attempts, last_error, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(event.id)
            .bind(event.batch_id.as_uuid())
            .bind(&event.event_type)
            .bind(&event.target_stream)
            .bind(payload)
            .bind(event.status.as_str())
            .bind(event.attempts as i32)
            .bind(&event.last_error)
            .bind(event.created_at.as_datetime())
            .bind(event.updated_at.as_datetime())
            .execute(&mut **tx)
            .await
            .map_err(|e| DomainError::database(format!("Failed to insert event: {}", e)))?;
        }
        Ok(())
    }

    /// Lock the batch row and check it is still in `expected`.
    async fn lock_in_status(
        tx: &mut Transaction<'_, Postgres>,
        batch_id: BatchId,
        expected: BatchStatus,
    ) -> Result<(), DomainError> {
        let row = sqlx::query("SELECT status FROM event_batches WHERE id = $1 FOR UPDATE")
            .bind(batch_id.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| DomainError::database(format!("Failed to lock batch: {}", e)))?
            .ok_or_else(|| batch_not_found(batch_id))?;

        let actual: String = row.get("status");
        if actual != expected.as_str() {
            return Err(status_changed(batch_id, expected.as_str(), &actual));
        }
        Ok(())
    }
}

#[async_trait]
impl EventLogWriter for PostgresEventLog {
    async fn create_batch(
        &self,
        batch: &EventBatch,
        events: &[EventLogTuple],
    ) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(begin_failed)?;

        sqlx::query(
            r#"
            INSERT INTO event_batches (id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(batch.id.as_uuid())
        .bind(batch.status.as_str())
        .bind(batch.created_at.as_datetime())
        .bind(batch.updated_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert batch: {}", e)))?;

        Self::insert_events(&mut tx, events).await?;

        tx.commit().await.map_err(commit_failed)
    }

    async fn add_events(
        &self,
        batch_id: BatchId,
        events: &[EventLogTuple],
    ) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(begin_failed)?;
        Self::lock_in_status(&mut tx, batch_id, BatchStatus::Initialized).await?;
        Self::insert_events(&mut tx, events).await?;

        tx.commit().await.map_err(commit_failed)
    }

    async fn abort_batch(&self, batch_id: BatchId) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(begin_failed)?;
        let now = Timestamp::now();
        Self::lock_in_status(&mut tx, batch_id, BatchStatus::Initialized).await?;

        sqlx::query("UPDATE event_batches SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(batch_id.as_uuid())
            .bind(BatchStatus::Aborted.as_str())
            .bind(now.as_datetime())
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::database(format!("Failed to abort batch: {}", e)))?;

        sqlx::query(
            r#"
            UPDATE event_log SET status = $2, updated_at = $3
            WHERE batch_id = $1 AND status = $4
            "#,
        )
        .bind(batch_id.as_uuid())
        .bind(EventStatus::Aborted.as_str())
        .bind(now.as_datetime())
        .bind(EventStatus::NotProcessed.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to abort batch events: {}", e)))?;

        tx.commit().await.map_err(commit_failed)
    }

    async fn update_batch(
        &self,
        batch: &EventBatch,
        expected: BatchStatus,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE event_batches SET status = $2, updated_at = $3
            WHERE id = $1 AND status = $4
            "#,
        )
        .bind(batch.id.as_uuid())
        .bind(batch.status.as_str())
        .bind(batch.updated_at.as_datetime())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update batch: {}", e)))?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let actual: Option<String> =
            sqlx::query_scalar("SELECT status FROM event_batches WHERE id = $1")
                .bind(batch.id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::database(format!("Failed to read batch: {}", e)))?;
        match actual {
            Some(actual) => Err(status_changed(batch.id, expected.as_str(), &actual)),
            None => Err(batch_not_found(batch.id)),
        }
    }

    async fn update_event(&self, event: &EventLogTuple) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE event_log SET
                status = $2,
                attempts = $3,
                last_error = $4,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(event.id)
        .bind(event.status.as_str())
        .bind(event.attempts as i32)
        .bind(&event.last_error)
        .bind(event.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update event: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::EventNotFound,
                format!("Event not found: {}", event.id),
            ));
        }
        Ok(())
    }

    async fn get_events(&self, batch_id: BatchId) -> Result<Vec<EventLogTuple>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, batch_id, event_type, target_stream, event, status,
                   attempts, last_error, created_at, updated_at
            FROM event_log
            WHERE batch_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(batch_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch events: {}", e)))?;

        rows.into_iter().map(row_to_event).collect()
    }

    async fn get_batch(&self, batch_id: BatchId) -> Result<Option<EventBatch>, DomainError> {
        let row = sqlx::query(
            "SELECT id, status, created_at, updated_at FROM event_batches WHERE id = $1",
        )
        .bind(batch_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch batch: {}", e)))?;

        row.map(row_to_batch).transpose()
    }

    async fn try_get_next_committed_batch(&self) -> Result<Option<EventBatch>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, status, created_at, updated_at
            FROM event_batches
            WHERE status IN ($1, $2)
            ORDER BY CASE WHEN status = $1 THEN 0 ELSE 1 END, updated_at ASC
            LIMIT 1
            "#,
        )
        .bind(BatchStatus::Processing.as_str())
        .bind(BatchStatus::Committed.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch next batch: {}", e)))?;

        row.map(row_to_batch).transpose()
    }
}

fn row_to_batch(row: PgRow) -> Result<EventBatch, DomainError> {
    let status: String = row.get("status");
    Ok(EventBatch {
        id: BatchId::from_uuid(row.get("id")),
        status: BatchStatus::parse(&status)?,
        created_at: Timestamp::from_datetime(row.get("created_at")),
        updated_at: Timestamp::from_datetime(row.get("updated_at")),
    })
}

fn row_to_event(row: PgRow) -> Result<EventLogTuple, DomainError> {
    let status: String = row.get("status");
    let envelope: serde_json::Value = row.get("event");
    let event: EventEnvelope = serde_json::from_value(envelope).map_err(|e| {
        DomainError::new(
            ErrorCode::InternalError,
            format!("Corrupt event envelope in event log: {}", e),
        )
    })?;
    let attempts: i32 = row.get("attempts");

    Ok(EventLogTuple {
        id: row.get("id"),
        batch_id: BatchId::from_uuid(row.get("batch_id")),
        event_type: row.get("event_type"),
        target_stream: row.get("target_stream"),
        event,
        status: EventStatus::parse(&status)?,
        attempts: attempts.max(0) as u32,
        last_error: row.get("last_error"),
        created_at: Timestamp::from_datetime(row.get("created_at")),
        updated_at: Timestamp::from_datetime(row.get("updated_at")),
    })
}

fn batch_not_found(batch_id: BatchId) -> DomainError {
    DomainError::new(
        ErrorCode::BatchNotFound,
        format!("Batch not found: {}", batch_id),
    )
}

fn status_changed(batch_id: BatchId, expected: &str, actual: &str) -> DomainError {
    DomainError::new(
        ErrorCode::InvalidStateTransition,
        format!("Batch {} is {}, expected {}", batch_id, actual, expected),
    )
    .with_detail("batch_id", batch_id.to_string())
    .with_detail("expected", expected)
    .with_detail("actual", actual)
}

fn begin_failed(e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to begin transaction: {}", e))
}

fn commit_failed(e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to commit transaction: {}", e))
}
