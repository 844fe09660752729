use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};
use crate::model::{
    GroceryItem, Household, HouseholdSnapshot, InventoryItem, Location, Product, NOT_FOUND,
};

/// Load the household row plus its derived member count. The snapshot is the
/// unit the gate and evaluator operate on; it is loaded fresh per request.
pub async fn household_snapshot(pool: &SqlitePool, household_id: &str) -> AppResult<HouseholdSnapshot> {
    let household = sqlx::query_as::<_, Household>(
        "SELECT id, name, is_premium, premium_expires_at, created_at, updated_at
         FROM household WHERE id = ?",
    )
    .bind(household_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)?
    .ok_or_else(|| {
        AppError::new(NOT_FOUND, "Household not found")
            .with_context("household_id", household_id.to_string())
    })?;

    let member_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM household_members WHERE household_id = ?")
            .bind(household_id)
            .fetch_one(pool)
            .await
            .map_err(AppError::from)?;

    Ok(HouseholdSnapshot {
        household,
        member_count,
    })
}

pub async fn count_inventory(pool: &SqlitePool, household_id: &str) -> AppResult<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM inventory_items WHERE household_id = ?")
        .bind(household_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::from)
}

pub async fn count_grocery(pool: &SqlitePool, household_id: &str) -> AppResult<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM grocery_items WHERE household_id = ?")
        .bind(household_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::from)
}

pub async fn location_exists(pool: &SqlitePool, household_id: &str, id: &str) -> AppResult<bool> {
    let row: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM locations WHERE household_id = ? AND id = ?")
            .bind(household_id)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::from)?;
    Ok(row.is_some())
}

pub async fn get_product(
    pool: &SqlitePool,
    household_id: &str,
    id: &str,
) -> AppResult<Option<Product>> {
    sqlx::query_as::<_, Product>(
        "SELECT id, household_id, name, brand, upc, created_at, updated_at
         FROM products WHERE household_id = ? AND id = ?",
    )
    .bind(household_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)
}

pub async fn get_location(
    pool: &SqlitePool,
    household_id: &str,
    id: &str,
) -> AppResult<Option<Location>> {
    sqlx::query_as::<_, Location>(
        "SELECT id, household_id, name, created_at, updated_at
         FROM locations WHERE household_id = ? AND id = ?",
    )
    .bind(household_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)
}

pub async fn get_inventory_item(
    pool: &SqlitePool,
    household_id: &str,
    id: &str,
) -> AppResult<Option<InventoryItem>> {
    sqlx::query_as::<_, InventoryItem>(
        "SELECT id, household_id, product_id, location_id, quantity, expires_at, created_at, updated_at
         FROM inventory_items WHERE household_id = ? AND id = ?",
    )
    .bind(household_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)
}

pub async fn get_grocery_item(
    pool: &SqlitePool,
    household_id: &str,
    id: &str,
) -> AppResult<Option<GroceryItem>> {
    sqlx::query_as::<_, GroceryItem>(
        "SELECT id, household_id, name, normalized_name, brand, upc, created_at, updated_at
         FROM grocery_items WHERE household_id = ? AND id = ?",
    )
    .bind(household_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)
}

/// Dedupe lookup. Grabs the oldest match so a racy double-insert still
/// resolves to one canonical row for later removal.
pub async fn find_grocery_by_normalized(
    pool: &SqlitePool,
    household_id: &str,
    normalized: &str,
) -> AppResult<Option<GroceryItem>> {
    sqlx::query_as::<_, GroceryItem>(
        "SELECT id, household_id, name, normalized_name, brand, upc, created_at, updated_at
         FROM grocery_items
         WHERE household_id = ? AND normalized_name = ?
         ORDER BY created_at, id
         LIMIT 1",
    )
    .bind(household_id)
    .bind(normalized)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)
}

/// All grocery rows matching a normalized name or, when present, a UPC.
pub async fn find_grocery_matching(
    pool: &SqlitePool,
    household_id: &str,
    normalized: &str,
    upc: Option<&str>,
) -> AppResult<Vec<GroceryItem>> {
    let rows = match upc {
        Some(upc) => {
            sqlx::query_as::<_, GroceryItem>(
                "SELECT id, household_id, name, normalized_name, brand, upc, created_at, updated_at
                 FROM grocery_items
                 WHERE household_id = ? AND (normalized_name = ? OR upc = ?)",
            )
            .bind(household_id)
            .bind(normalized)
            .bind(upc)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, GroceryItem>(
                "SELECT id, household_id, name, normalized_name, brand, upc, created_at, updated_at
                 FROM grocery_items
                 WHERE household_id = ? AND normalized_name = ?",
            )
            .bind(household_id)
            .bind(normalized)
            .fetch_all(pool)
            .await
        }
    };
    rows.map_err(AppError::from)
}

pub async fn insert_grocery_item(pool: &SqlitePool, item: &GroceryItem) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO grocery_items (id, household_id, name, normalized_name, brand, upc, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&item.id)
    .bind(&item.household_id)
    .bind(&item.name)
    .bind(&item.normalized_name)
    .bind(&item.brand)
    .bind(&item.upc)
    .bind(item.created_at)
    .bind(item.updated_at)
    .execute(pool)
    .await
    .map_err(AppError::from)?;
    Ok(())
}

/// Returns true when a row was removed.
pub async fn delete_grocery_item(pool: &SqlitePool, household_id: &str, id: &str) -> AppResult<bool> {
    let res = sqlx::query("DELETE FROM grocery_items WHERE household_id = ? AND id = ?")
        .bind(household_id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::from)?;
    Ok(res.rows_affected() > 0)
}
