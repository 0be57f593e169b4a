//! SQLite implementation of ILocalStore
//!
//! This module provides the concrete SQLite-based implementation of the
//! mirror and queue ports defined in healthbuddy-core. Every write that
//! touches both tables runs inside one SQLite transaction.
//!
//! ## Type Mapping
//!
//! | Domain Type      | SQL Type | Strategy                                    |
//! |------------------|----------|---------------------------------------------|
//! | EntityId         | TEXT     | `as_str()` / `FromStr`                      |
//! | EntityKind       | TEXT     | `as_str()` (denormalized for listing)       |
//! | LogicalPath      | TEXT     | `as_str()` / `LogicalPath::new()`           |
//! | QueueId          | INTEGER  | AUTOINCREMENT rowid                         |
//! | OperationMethod  | TEXT     | `as_str()` / `FromStr`                      |
//! | IdempotencyKey   | TEXT     | UUID string via `to_string()` / `FromStr`   |
//! | EntityPayload    | TEXT     | serde_json serialization                    |
//! | bool             | INTEGER  | 0 / 1                                       |
//! | DateTime<Utc>    | TEXT     | fixed-width RFC 3339 (microseconds, `Z`)    |

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use healthbuddy_core::domain::{
    newtypes::{EntityId, IdempotencyKey, LogicalPath, QueueId},
    mirror::{overlay, server_id},
    EntityPayload, MirrorEntry, NewOperation, OperationMethod, QueuedOperation,
};
use healthbuddy_core::ports::{
    EntryFilter, IClock, ILocalStore, IMirrorStore, IOutboundQueue, SystemClock,
};

use crate::CacheError;

/// SQLite-based implementation of the local store ports
///
/// Holds the mirror and the outbound queue in one database. Timestamps
/// (`last_updated`, `enqueued_at`) come from the injected clock.
pub struct SqliteLocalStore {
    pool: SqlitePool,
    clock: Arc<dyn IClock>,
}

impl SqliteLocalStore {
    /// Creates a store using the wall clock
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    /// Creates a store stamping rows with `clock`
    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn IClock>) -> Self {
        Self { pool, clock }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Format a timestamp so lexicographic order matches chronological order
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Try parsing without timezone (SQLite default format)
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            CacheError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn parse_domain<T>(value: &str, what: &str) -> Result<T, CacheError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| CacheError::SerializationError(format!("Invalid {} '{}': {}", what, value, e)))
}

// ============================================================================
// Row mapping functions
// ============================================================================

/// Reconstruct a MirrorEntry from a database row
fn entry_from_row(row: &SqliteRow) -> Result<MirrorEntry, CacheError> {
    let entity_id: String = row.try_get("entity_id")?;
    let value: String = row.try_get("value")?;
    let pending_sync: i64 = row.try_get("pending_sync")?;
    let last_updated: String = row.try_get("last_updated")?;

    Ok(MirrorEntry::new(
        parse_domain(&entity_id, "entity id")?,
        serde_json::from_str(&value)?,
        pending_sync != 0,
        parse_datetime(&last_updated)?,
    ))
}

/// Reconstruct a QueuedOperation from a database row
fn operation_from_row(row: &SqliteRow) -> Result<QueuedOperation, CacheError> {
    let queue_id: i64 = row.try_get("queue_id")?;
    let method: String = row.try_get("method")?;
    let target: String = row.try_get("target")?;
    let entity_id: String = row.try_get("entity_id")?;
    let payload: String = row.try_get("payload")?;
    let idempotency_key: String = row.try_get("idempotency_key")?;
    let enqueued_at: String = row.try_get("enqueued_at")?;
    let retry_count: i64 = row.try_get("retry_count")?;
    let last_error: Option<String> = row.try_get("last_error")?;

    let target = LogicalPath::new(target.as_str())
        .map_err(|e| CacheError::SerializationError(e.to_string()))?;

    Ok(QueuedOperation::restore(
        QueueId::new(queue_id),
        parse_domain::<OperationMethod>(&method, "method")?,
        target,
        parse_domain(&entity_id, "entity id")?,
        serde_json::from_str(&payload)?,
        parse_domain::<IdempotencyKey>(&idempotency_key, "idempotency key")?,
        parse_datetime(&enqueued_at)?,
        u32::try_from(retry_count).unwrap_or(u32::MAX),
        last_error,
    ))
}

// ============================================================================
// Statements shared by single writes and transactions
// ============================================================================

async fn upsert_entry(
    conn: &mut SqliteConnection,
    entity_id: &EntityId,
    value: &EntityPayload,
    pending_sync: bool,
    now: DateTime<Utc>,
) -> Result<MirrorEntry, CacheError> {
    let value_json = serde_json::to_string(value)?;

    sqlx::query(
        "INSERT INTO mirror_entries (entity_id, kind, value, pending_sync, last_updated) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(entity_id) DO UPDATE SET \
           value = excluded.value, \
           pending_sync = excluded.pending_sync, \
           last_updated = excluded.last_updated",
    )
    .bind(entity_id.as_str())
    .bind(entity_id.kind().as_str())
    .bind(&value_json)
    .bind(i64::from(pending_sync))
    .bind(format_datetime(&now))
    .execute(&mut *conn)
    .await?;

    Ok(MirrorEntry::new(
        entity_id.clone(),
        value.clone(),
        pending_sync,
        now,
    ))
}

async fn insert_operation(
    conn: &mut SqliteConnection,
    operation: &NewOperation,
    now: DateTime<Utc>,
) -> Result<QueueId, CacheError> {
    let payload_json = serde_json::to_string(&operation.payload)?;

    let result = sqlx::query(
        "INSERT INTO outbound_queue \
         (method, target, entity_id, payload, idempotency_key, enqueued_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(operation.method.as_str())
    .bind(operation.target.as_str())
    .bind(operation.entity_id.as_str())
    .bind(&payload_json)
    .bind(operation.idempotency_key.to_string())
    .bind(format_datetime(&now))
    .execute(&mut *conn)
    .await?;

    Ok(QueueId::new(result.last_insert_rowid()))
}

async fn queued_for_entity(
    conn: &mut SqliteConnection,
    entity_id: &EntityId,
) -> Result<i64, CacheError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outbound_queue WHERE entity_id = ?")
        .bind(entity_id.as_str())
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

/// Points queued operations addressed by the entity's local key at the id
/// the remote assigned (`/meals/{local}` becomes `/meals/{server}`)
///
/// Returns how many operations were rewritten.
async fn rebind_targets(
    conn: &mut SqliteConnection,
    entity_id: &EntityId,
    server_key: &str,
) -> Result<u64, CacheError> {
    let Some(local_key) = entity_id.key() else {
        return Ok(0);
    };
    if local_key == server_key {
        return Ok(0);
    }

    let rows: Vec<(i64, String)> =
        sqlx::query_as("SELECT queue_id, target FROM outbound_queue WHERE entity_id = ?")
            .bind(entity_id.as_str())
            .fetch_all(&mut *conn)
            .await?;

    let suffix = format!("/{local_key}");
    let mut rebound = 0;
    for (queue_id, target) in rows {
        let Some(prefix) = target.strip_suffix(&suffix) else {
            continue;
        };
        let Ok(target) = LogicalPath::new(format!("{prefix}/{server_key}")) else {
            tracing::warn!(
                entity_id = %entity_id,
                server_key,
                "Server id is not a valid path segment"
            );
            return Ok(rebound);
        };

        sqlx::query("UPDATE outbound_queue SET target = ? WHERE queue_id = ?")
            .bind(target.as_str())
            .bind(queue_id)
            .execute(&mut *conn)
            .await?;
        rebound += 1;
    }

    if rebound > 0 {
        tracing::debug!(
            entity_id = %entity_id,
            server_key,
            rebound,
            "Rebound queued targets to server id"
        );
    }
    Ok(rebound)
}

/// Applies a server value to the mirror
///
/// With no newer operations queued for the entity the server value replaces
/// the entry and clears `pending_sync`. Otherwise the newer optimistic value
/// is laid over the server value (so assigned ids survive), the entry stays
/// pending, and queued operations addressed by the local key are rebound to
/// the server id.
///
/// Returns true if the entry is now reconciled.
async fn reconcile_entry(
    conn: &mut SqliteConnection,
    entity_id: &EntityId,
    server_value: &EntityPayload,
    now: DateTime<Utc>,
) -> Result<bool, CacheError> {
    let remaining = queued_for_entity(conn, entity_id).await?;
    if remaining == 0 {
        upsert_entry(conn, entity_id, server_value, false, now).await?;
        return Ok(true);
    }

    let current: Option<String> =
        sqlx::query_scalar("SELECT value FROM mirror_entries WHERE entity_id = ?")
            .bind(entity_id.as_str())
            .fetch_optional(&mut *conn)
            .await?;
    let merged = match current {
        Some(value) => overlay(server_value, &serde_json::from_str(&value)?),
        None => server_value.clone(),
    };
    upsert_entry(conn, entity_id, &merged, true, now).await?;

    if let Some(server_key) = server_id(server_value) {
        rebind_targets(conn, entity_id, server_key).await?;
    }

    tracing::debug!(
        entity_id = %entity_id,
        remaining,
        "Newer operations still queued; server value merged under optimistic value"
    );
    Ok(false)
}

// ============================================================================
// IMirrorStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IMirrorStore for SqliteLocalStore {
    async fn get(&self, entity_id: &EntityId) -> anyhow::Result<Option<MirrorEntry>> {
        let row = sqlx::query("SELECT * FROM mirror_entries WHERE entity_id = ?")
            .bind(entity_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(entry_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        entity_id: &EntityId,
        value: &EntityPayload,
        pending_sync: bool,
    ) -> anyhow::Result<MirrorEntry> {
        let mut conn = self.pool.acquire().await?;
        let entry = upsert_entry(&mut conn, entity_id, value, pending_sync, self.clock.now()).await?;

        tracing::trace!(entity_id = %entity_id, pending_sync, "Saved mirror entry");
        Ok(entry)
    }

    async fn mark_synced(
        &self,
        entity_id: &EntityId,
        server_value: &EntityPayload,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        let reconciled = reconcile_entry(&mut tx, entity_id, server_value, self.clock.now()).await?;
        tx.commit().await?;

        tracing::trace!(entity_id = %entity_id, reconciled, "Marked mirror entry synced");
        Ok(())
    }

    async fn refresh(
        &self,
        entity_id: &EntityId,
        server_value: &EntityPayload,
    ) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        let pending: Option<i64> =
            sqlx::query_scalar("SELECT pending_sync FROM mirror_entries WHERE entity_id = ?")
                .bind(entity_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;

        if pending.unwrap_or(0) != 0 || queued_for_entity(&mut tx, entity_id).await? > 0 {
            tracing::debug!(entity_id = %entity_id, "Skipping refresh of pending entry");
            return Ok(false);
        }

        upsert_entry(&mut tx, entity_id, server_value, false, self.clock.now()).await?;
        tx.commit().await?;

        tracing::trace!(entity_id = %entity_id, "Refreshed mirror entry from remote");
        Ok(true)
    }

    async fn delete(&self, entity_id: &EntityId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM mirror_entries WHERE entity_id = ?")
            .bind(entity_id.as_str())
            .execute(&self.pool)
            .await?;

        tracing::trace!(entity_id = %entity_id, "Deleted mirror entry");
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &EntryFilter) -> anyhow::Result<Vec<MirrorEntry>> {
        let mut sql = String::from("SELECT * FROM mirror_entries WHERE 1=1");

        if filter.kind.is_some() {
            sql.push_str(" AND kind = ?");
        }
        if filter.pending_only {
            sql.push_str(" AND pending_sync = 1");
        }
        sql.push_str(" ORDER BY last_updated DESC, entity_id ASC");
        if filter.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query(&sql);
        if let Some(kind) = filter.kind {
            query = query.bind(kind.as_str());
        }
        if let Some(limit) = filter.limit {
            query = query.bind(i64::from(limit));
        }

        let rows = query.fetch_all(&self.pool).await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(entry_from_row(row)?);
        }

        Ok(entries)
    }
}

// ============================================================================
// IOutboundQueue implementation
// ============================================================================

#[async_trait::async_trait]
impl IOutboundQueue for SqliteLocalStore {
    async fn enqueue(&self, operation: &NewOperation) -> anyhow::Result<QueueId> {
        let mut conn = self.pool.acquire().await?;
        let queue_id = insert_operation(&mut conn, operation, self.clock.now()).await?;

        tracing::debug!(
            queue_id = %queue_id,
            method = %operation.method,
            target = %operation.target,
            "Enqueued operation"
        );
        Ok(queue_id)
    }

    async fn peek_ordered(&self) -> anyhow::Result<Vec<QueuedOperation>> {
        let rows = sqlx::query("SELECT * FROM outbound_queue ORDER BY queue_id ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut operations = Vec::with_capacity(rows.len());
        for row in &rows {
            operations.push(operation_from_row(row)?);
        }

        Ok(operations)
    }

    async fn get_operation(&self, queue_id: QueueId) -> anyhow::Result<Option<QueuedOperation>> {
        let row = sqlx::query("SELECT * FROM outbound_queue WHERE queue_id = ?")
            .bind(queue_id.value())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(operation_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, queue_id: QueueId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM outbound_queue WHERE queue_id = ?")
            .bind(queue_id.value())
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        tracing::trace!(queue_id = %queue_id, removed, "Removed operation");
        Ok(removed)
    }

    async fn record_failure(&self, queue_id: QueueId, error: &str) -> anyhow::Result<Option<u32>> {
        let count: Option<i64> = sqlx::query_scalar(
            "UPDATE outbound_queue SET retry_count = retry_count + 1, last_error = ? \
             WHERE queue_id = ? RETURNING retry_count",
        )
        .bind(error)
        .bind(queue_id.value())
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.map(|c| u32::try_from(c).unwrap_or(u32::MAX)))
    }

    async fn pending_count(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outbound_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn clear(&self) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM outbound_queue")
            .execute(&self.pool)
            .await?;

        tracing::info!(removed = result.rows_affected(), "Cleared outbound queue");
        Ok(result.rows_affected())
    }
}

// ============================================================================
// ILocalStore implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalStore for SqliteLocalStore {
    async fn record_mutation(
        &self,
        entity_id: &EntityId,
        value: &EntityPayload,
        operation: &NewOperation,
    ) -> anyhow::Result<(MirrorEntry, QueueId)> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        let entry = upsert_entry(&mut tx, entity_id, value, true, now).await?;
        let queue_id = insert_operation(&mut tx, operation, now).await?;

        tx.commit().await?;

        tracing::debug!(
            entity_id = %entity_id,
            queue_id = %queue_id,
            method = %operation.method,
            target = %operation.target,
            "Recorded mutation"
        );
        Ok((entry, queue_id))
    }

    async fn acknowledge(
        &self,
        queue_id: QueueId,
        entity_id: &EntityId,
        server_value: &EntityPayload,
    ) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM outbound_queue WHERE queue_id = ?")
            .bind(queue_id.value())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            tracing::debug!(queue_id = %queue_id, "Operation already acknowledged");
            return Ok(false);
        }

        let reconciled = reconcile_entry(&mut tx, entity_id, server_value, self.clock.now()).await?;
        tx.commit().await?;

        tracing::trace!(
            queue_id = %queue_id,
            entity_id = %entity_id,
            reconciled,
            "Acknowledged operation"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_datetime_sorts_chronologically() {
        let base = DateTime::parse_from_rfc3339("2026-10-16T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = base + Duration::microseconds(500);
        assert!(format_datetime(&base) < format_datetime(&later));
        assert!(format_datetime(&base).ends_with('Z'));
    }

    #[test]
    fn test_parse_datetime_roundtrip() {
        let now = Utc::now();
        let parsed = parse_datetime(&format_datetime(&now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn test_parse_datetime_sqlite_default_format() {
        let parsed = parse_datetime("2026-10-16 08:30:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-10-16T08:30:00+00:00");
    }

    #[test]
    fn test_parse_domain_reports_field() {
        let err = parse_domain::<OperationMethod>("DELETE", "method").unwrap_err();
        assert!(err.to_string().contains("Invalid method 'DELETE'"));
    }
}
