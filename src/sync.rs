use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};
use crate::model::{InventoryItem, MutationLogEntry, Product};
use crate::mutation_log;
use crate::time::now_ms;

/// Bootstrap payload: the household's current materialized state, read
/// straight from the tables. The log is never replayed to build this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullSnapshot {
    pub products: Vec<Product>,
    pub inventory: Vec<InventoryItem>,
    pub server_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeFeedPage {
    pub changes: Vec<MutationLogEntry>,
    pub server_time: i64,
}

pub async fn full_snapshot(pool: &SqlitePool, household_id: &str) -> AppResult<FullSnapshot> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT id, household_id, name, brand, upc, created_at, updated_at
         FROM products WHERE household_id = ? ORDER BY id",
    )
    .bind(household_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::from)?;

    let inventory = sqlx::query_as::<_, InventoryItem>(
        "SELECT id, household_id, product_id, location_id, quantity, expires_at, created_at, updated_at
         FROM inventory_items WHERE household_id = ? ORDER BY id",
    )
    .bind(household_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::from)?;

    Ok(FullSnapshot {
        products,
        inventory,
        server_time: now_ms(),
    })
}

pub async fn changes_since(
    pool: &SqlitePool,
    household_id: &str,
    cursor: i64,
) -> AppResult<ChangeFeedPage> {
    let changes = mutation_log::changes_since(pool, household_id, cursor).await?;
    Ok(ChangeFeedPage {
        changes,
        server_time: now_ms(),
    })
}
