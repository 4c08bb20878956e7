//! PostgreSQL implementation of EventStorageClient.
//!
//! Appends to the `event_store` table. Positions are assigned per stream
//! under a transaction-scoped advisory lock on the stream name. A write of
//! an event id that is already stored returns the original position, so
//! the outbox's at-least-once redelivery does not duplicate events.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{EventStorageClient, WriteEventResult};

use super::in_memory::is_acceptable;

/// PostgreSQL implementation of EventStorageClient.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn store_error(context: &str, stream: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::EventStoreError, format!("{}: {}", context, e))
        .with_detail("stream", stream)
}

#[async_trait]
impl EventStorageClient for PostgresEventStore {
    async fn write_event(
        &self,
        event: &EventEnvelope,
        stream: &str,
    ) -> Result<WriteEventResult, DomainError> {
        let envelope = serde_json::to_value(event).map_err(|e| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Failed to serialize event envelope: {}", e),
            )
        })?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("Failed to begin append", stream, e))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(stream)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("Failed to lock stream", stream, e))?;

        let existing = sqlx::query(
            "SELECT stream_position FROM event_store WHERE stream = $1 AND event_id = $2",
        )
        .bind(stream)
        .bind(event.event_id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| store_error("Failed to check for duplicate", stream, e))?;

        let position: i64 = match existing {
            Some(row) => row.get("stream_position"),
            None => {
                let row = sqlx::query(
                    r#"
                    INSERT INTO event_store (
                        stream, stream_position, event_id, event_type, envelope, occurred_at
                    )
                    SELECT $1, COALESCE(MAX(stream_position) + 1, 0), $2, $3, $4, $5
                    FROM event_store WHERE stream = $1
                    RETURNING stream_position
                    "#,
                )
                .bind(stream)
                .bind(event.event_id.as_str())
                .bind(&event.event_type)
                .bind(envelope)
                .bind(event.occurred_at.as_datetime())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| store_error("Failed to append event", stream, e))?;
                row.get("stream_position")
            }
        };

        tx.commit()
            .await
            .map_err(|e| store_error("Failed to commit append", stream, e))?;

        Ok(WriteEventResult {
            event_id: event.event_id.clone(),
            stream: stream.to_string(),
            stream_position: position.max(0) as u64,
        })
    }

    async fn validate_events(&self, events: &[EventEnvelope]) -> Result<bool, DomainError> {
        Ok(events.iter().all(is_acceptable))
    }
}
