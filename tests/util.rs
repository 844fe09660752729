#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};

use larder::commands;
use larder::queue::{ActionTransport, QueuedAction, TransportError};
use sqlx::SqlitePool;

/// Fresh in-memory server database with the full schema applied.
pub async fn temp_pool() -> SqlitePool {
    let pool = larder::db::open_memory_pool()
        .await
        .expect("open in-memory pool");
    larder::migrate::apply_migrations(&pool)
        .await
        .expect("apply migrations");
    pool
}

/// Bare in-memory pool for the client-side database; the queue/cache create
/// their own tables.
pub async fn client_pool() -> SqlitePool {
    larder::db::open_memory_pool()
        .await
        .expect("open in-memory pool")
}

/// Insert a household with `members` member rows, bypassing the command layer
/// so tests control the mutation log exactly.
pub async fn seed_household(
    pool: &SqlitePool,
    id: &str,
    members: i64,
    is_premium: bool,
    premium_expires_at: Option<i64>,
) {
    sqlx::query(
        "INSERT INTO household (id, name, is_premium, premium_expires_at, created_at, updated_at)
         VALUES (?, ?, ?, ?, 0, 0)",
    )
    .bind(id)
    .bind(format!("household {id}"))
    .bind(is_premium)
    .bind(premium_expires_at)
    .execute(pool)
    .await
    .unwrap();
    for n in 0..members {
        sqlx::query(
            "INSERT INTO household_members (id, household_id, name, created_at, updated_at)
             VALUES (?, ?, ?, 0, 0)",
        )
        .bind(format!("{id}-m{n}"))
        .bind(id)
        .bind(format!("member {n}"))
        .execute(pool)
        .await
        .unwrap();
    }
}

pub async fn seed_location(pool: &SqlitePool, household_id: &str, id: &str) {
    sqlx::query(
        "INSERT INTO locations (id, household_id, name, created_at, updated_at)
         VALUES (?, ?, ?, 0, 0)",
    )
    .bind(id)
    .bind(household_id)
    .bind(format!("location {id}"))
    .execute(pool)
    .await
    .unwrap();
}

pub async fn seed_product(pool: &SqlitePool, household_id: &str, id: &str, name: &str) {
    seed_product_with_upc(pool, household_id, id, name, None).await;
}

pub async fn seed_product_with_upc(
    pool: &SqlitePool,
    household_id: &str,
    id: &str,
    name: &str,
    upc: Option<&str>,
) {
    sqlx::query(
        "INSERT INTO products (id, household_id, name, brand, upc, created_at, updated_at)
         VALUES (?, ?, ?, NULL, ?, 0, 0)",
    )
    .bind(id)
    .bind(household_id)
    .bind(name)
    .bind(upc)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn seed_inventory_item(
    pool: &SqlitePool,
    household_id: &str,
    id: &str,
    product_id: &str,
    location_id: &str,
    quantity: i64,
) {
    sqlx::query(
        "INSERT INTO inventory_items (id, household_id, product_id, location_id, quantity, expires_at, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, NULL, 0, 0)",
    )
    .bind(id)
    .bind(household_id)
    .bind(product_id)
    .bind(location_id)
    .bind(quantity)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn seed_grocery_item(pool: &SqlitePool, household_id: &str, id: &str, name: &str) {
    sqlx::query(
        "INSERT INTO grocery_items (id, household_id, name, normalized_name, brand, upc, created_at, updated_at)
         VALUES (?, ?, ?, ?, NULL, NULL, 0, 0)",
    )
    .bind(id)
    .bind(household_id)
    .bind(name)
    .bind(larder::model::normalized_name(name))
    .execute(pool)
    .await
    .unwrap();
}

pub async fn inventory_count(pool: &SqlitePool, household_id: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM inventory_items WHERE household_id = ?")
        .bind(household_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn grocery_names(pool: &SqlitePool, household_id: &str) -> Vec<String> {
    sqlx::query_scalar(
        "SELECT normalized_name FROM grocery_items WHERE household_id = ? ORDER BY normalized_name",
    )
    .bind(household_id)
    .fetch_all(pool)
    .await
    .unwrap()
}

/// In-process loopback: delivers queued actions straight into the server
/// command layer, classifying errors the way an HTTP client splits 4xx/5xx.
pub struct ServerTransport {
    pub pool: SqlitePool,
    pub household_id: String,
}

impl ActionTransport for ServerTransport {
    async fn submit(&self, action: &QueuedAction) -> Result<(), TransportError> {
        commands::apply_action(&self.pool, &self.household_id, action)
            .await
            .map_err(TransportError::classify)
    }
}

/// Fails one specific action with a transient error on its first attempt,
/// then behaves like the inner transport.
pub struct FlakyOnce<T> {
    pub inner: T,
    pub fail_entity_id: String,
    pub fail_op: String,
    tripped: AtomicBool,
}

impl<T> FlakyOnce<T> {
    pub fn new(inner: T, fail_entity_id: &str, fail_op: &str) -> Self {
        FlakyOnce {
            inner,
            fail_entity_id: fail_entity_id.to_string(),
            fail_op: fail_op.to_string(),
            tripped: AtomicBool::new(false),
        }
    }
}

impl<T: ActionTransport + Sync> ActionTransport for FlakyOnce<T> {
    async fn submit(&self, action: &QueuedAction) -> Result<(), TransportError> {
        if action.entity_id == self.fail_entity_id
            && action.op == self.fail_op
            && !self.tripped.swap(true, Ordering::SeqCst)
        {
            return Err(TransportError::Transient("connection reset".into()));
        }
        self.inner.submit(action).await
    }
}

/// Applies one specific action server-side but drops the acknowledgment, the
/// way a connection cut after commit looks to the client.
pub struct LostAckOnce<T> {
    pub inner: T,
    pub entity_id: String,
    tripped: AtomicBool,
}

impl<T> LostAckOnce<T> {
    pub fn new(inner: T, entity_id: &str) -> Self {
        LostAckOnce {
            inner,
            entity_id: entity_id.to_string(),
            tripped: AtomicBool::new(false),
        }
    }
}

impl<T: ActionTransport + Sync> ActionTransport for LostAckOnce<T> {
    async fn submit(&self, action: &QueuedAction) -> Result<(), TransportError> {
        if action.entity_id == self.entity_id && !self.tripped.swap(true, Ordering::SeqCst) {
            self.inner.submit(action).await?;
            return Err(TransportError::Transient("connection dropped mid-ack".into()));
        }
        self.inner.submit(action).await
    }
}
