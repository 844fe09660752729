use serde::Serialize;
use sqlx::SqlitePool;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::model::{EntityType, MutationLogEntry, Op};
use crate::time::now_ms;

/// Append an accepted write to the household's log. Best-effort by contract:
/// the primary mutation has already committed, so a failure here is recorded
/// and swallowed, never propagated. Returns the assigned sequence number when
/// the append lands.
pub async fn append<P: Serialize>(
    pool: &SqlitePool,
    household_id: &str,
    entity_type: EntityType,
    entity_id: &str,
    op: Op,
    payload: &P,
) -> Option<i64> {
    match try_append(pool, household_id, entity_type, entity_id, op, payload).await {
        Ok(seq) => Some(seq),
        Err(err) => {
            warn!(
                target = "larder",
                event = "mutation_log_append_failed",
                household_id = %household_id,
                entity_type = %entity_type.as_str(),
                entity_id = %entity_id,
                op = %op.as_str(),
                error = %err
            );
            None
        }
    }
}

async fn try_append<P: Serialize>(
    pool: &SqlitePool,
    household_id: &str,
    entity_type: EntityType,
    entity_id: &str,
    op: Op,
    payload: &P,
) -> AppResult<i64> {
    let payload = serde_json::to_string(payload).map_err(AppError::from)?;
    let res = sqlx::query(
        "INSERT INTO mutation_log (household_id, entity_type, entity_id, op, payload, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(household_id)
    .bind(entity_type.as_str())
    .bind(entity_id)
    .bind(op.as_str())
    .bind(payload)
    .bind(now_ms())
    .execute(pool)
    .await
    .map_err(AppError::from)?;
    Ok(res.last_insert_rowid())
}

/// Every entry strictly after `cursor`, in log order. The caller applies them
/// in the returned order and then advances its cursor to the last `seq`.
pub async fn changes_since(
    pool: &SqlitePool,
    household_id: &str,
    cursor: i64,
) -> AppResult<Vec<MutationLogEntry>> {
    sqlx::query_as::<_, MutationLogEntry>(
        "SELECT seq, household_id, entity_type, entity_id, op, payload, created_at
         FROM mutation_log
         WHERE household_id = ? AND seq > ?
         ORDER BY seq ASC",
    )
    .bind(household_id)
    .bind(cursor)
    .fetch_all(pool)
    .await
    .map_err(AppError::from)
}
