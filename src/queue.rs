use std::future::Future;
use std::path::Path;

use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::db;
use crate::error::{AppError, AppResult};
use crate::id::new_uuid_v7;
use crate::model::{EntityType, DOMAIN_REJECTION_CODES};
use crate::time::now_ms;

static CLIENT_SCHEMA: &str = include_str!("../migrations/client/0001_client_schema.sql");

/// Create the device-local tables (queue, mirror, cursor). Idempotent.
pub async fn init_client_db(pool: &SqlitePool) -> AppResult<()> {
    for stmt in CLIENT_SCHEMA.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await.map_err(AppError::from)?;
    }
    Ok(())
}

/// Operation kinds a client can queue. `Adjust` is the relative quantity
/// change; everything else maps one-to-one onto log operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOp {
    Create,
    Update,
    Adjust,
    Delete,
}

impl ActionOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionOp::Create => "create",
            ActionOp::Update => "update",
            ActionOp::Adjust => "adjust",
            ActionOp::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<ActionOp> {
        match value {
            "create" => Some(ActionOp::Create),
            "update" => Some(ActionOp::Update),
            "adjust" => Some(ActionOp::Adjust),
            "delete" => Some(ActionOp::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Pending,
    InFlight,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::InFlight => "in_flight",
            DeliveryStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct QueuedAction {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub op: String,
    pub payload: String,
    pub queued_at: i64,
    pub status: String,
}

/// How a submission attempt failed. Transient failures halt the drain and
/// leave the entry for retry; rejections drop the entry and are surfaced.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transient transport failure: {0}")]
    Transient(String),
    #[error("rejected by server: {0}")]
    Rejected(AppError),
}

impl TransportError {
    /// Split a server error the way an HTTP client splits 4xx from 5xx:
    /// known domain codes are permanent, everything else is retryable.
    pub fn classify(err: AppError) -> TransportError {
        if DOMAIN_REJECTION_CODES.contains(&err.code()) {
            TransportError::Rejected(err)
        } else {
            TransportError::Transient(err.to_string())
        }
    }
}

/// Seam between the queue and whatever carries actions to the server. The
/// real shell plugs an HTTP client in here; tests use an in-process loopback.
pub trait ActionTransport {
    fn submit(
        &self,
        action: &QueuedAction,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[derive(Debug, Clone)]
pub struct RejectedAction {
    pub action: QueuedAction,
    pub error: AppError,
}

#[derive(Debug, Default)]
pub struct DrainSummary {
    pub delivered: usize,
    pub rejected: Vec<RejectedAction>,
    /// Reason the drain halted early, if it did.
    pub halted: Option<String>,
}

/// Durable FIFO of not-yet-acknowledged local mutations. One queue per
/// device database; entries survive process restarts.
pub struct ActionQueue {
    pool: SqlitePool,
    drain_lock: Mutex<()>,
}

impl ActionQueue {
    /// Open (or create) the device database at `path`.
    pub async fn open(path: &Path) -> AppResult<ActionQueue> {
        let pool = db::open_pool(path).await.map_err(AppError::from)?;
        ActionQueue::with_pool(pool).await
    }

    /// Wrap an existing client pool (shared with [`crate::cache::ClientCache`]).
    pub async fn with_pool(pool: SqlitePool) -> AppResult<ActionQueue> {
        init_client_db(&pool).await?;
        Ok(ActionQueue {
            pool,
            drain_lock: Mutex::new(()),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Record a local mutation the instant it happens (optimistic
    /// write-ahead). Insertion order is delivery order.
    pub async fn enqueue<P: Serialize>(
        &self,
        entity_type: EntityType,
        op: ActionOp,
        entity_id: &str,
        payload: &P,
    ) -> AppResult<QueuedAction> {
        let action = QueuedAction {
            id: new_uuid_v7(),
            entity_type: entity_type.as_str().to_string(),
            entity_id: entity_id.to_string(),
            op: op.as_str().to_string(),
            payload: serde_json::to_string(payload).map_err(AppError::from)?,
            queued_at: now_ms(),
            status: DeliveryStatus::Pending.as_str().to_string(),
        };
        sqlx::query(
            "INSERT INTO action_queue (id, entity_type, entity_id, op, payload, queued_at, status)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&action.id)
        .bind(&action.entity_type)
        .bind(&action.entity_id)
        .bind(&action.op)
        .bind(&action.payload)
        .bind(action.queued_at)
        .bind(&action.status)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        debug!(
            target = "larder",
            event = "action_enqueued",
            action_id = %action.id,
            entity_type = %action.entity_type,
            op = %action.op
        );
        Ok(action)
    }

    /// Entries still awaiting acknowledgment, oldest first.
    pub async fn pending_actions(&self) -> AppResult<Vec<QueuedAction>> {
        sqlx::query_as::<_, QueuedAction>(
            "SELECT id, entity_type, entity_id, op, payload, queued_at, status
             FROM action_queue ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }

    pub async fn is_empty(&self) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM action_queue")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(count == 0)
    }

    /// Drain the queue: strict FIFO, a single in-flight entry at a time.
    ///
    /// The first transient failure halts the whole drain so a later action is
    /// never applied before an earlier unacknowledged one. Domain rejections
    /// drop the entry instead of wedging the queue, and are reported in the
    /// summary for the shell to surface.
    ///
    /// The internal lock means concurrent drain triggers (foregrounding, a
    /// timer, a post-mutation kick) serialize rather than race.
    pub async fn drain<T: ActionTransport>(&self, transport: &T) -> AppResult<DrainSummary> {
        let _guard = self.drain_lock.lock().await;

        // Re-arm entries a previous drain (or a crashed process) left behind.
        sqlx::query("UPDATE action_queue SET status = 'pending' WHERE status != 'pending'")
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;

        let mut summary = DrainSummary::default();
        loop {
            let Some(action) = sqlx::query_as::<_, QueuedAction>(
                "SELECT id, entity_type, entity_id, op, payload, queued_at, status
                 FROM action_queue WHERE status = 'pending' ORDER BY rowid LIMIT 1",
            )
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?
            else {
                break;
            };

            self.set_status(&action.id, DeliveryStatus::InFlight).await?;

            match transport.submit(&action).await {
                Ok(()) => {
                    self.remove(&action.id).await?;
                    summary.delivered += 1;
                }
                Err(TransportError::Rejected(err)) => {
                    warn!(
                        target = "larder",
                        event = "action_rejected",
                        action_id = %action.id,
                        code = %err.code(),
                        entity_type = %action.entity_type,
                        op = %action.op
                    );
                    self.remove(&action.id).await?;
                    summary.rejected.push(RejectedAction { action, error: err });
                }
                Err(TransportError::Transient(reason)) => {
                    info!(
                        target = "larder",
                        event = "drain_halted",
                        action_id = %action.id,
                        reason = %reason
                    );
                    self.set_status(&action.id, DeliveryStatus::Failed).await?;
                    summary.halted = Some(reason);
                    break;
                }
            }
        }
        Ok(summary)
    }

    async fn set_status(&self, id: &str, status: DeliveryStatus) -> AppResult<()> {
        sqlx::query("UPDATE action_queue SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM action_queue WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}
