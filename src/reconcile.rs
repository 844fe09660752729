use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::entitlement;
use crate::error::AppResult;
use crate::id::new_uuid_v7;
use crate::model::{normalized_name, EntityType, GroceryItem, HouseholdSnapshot, Op, Product};
use crate::mutation_log;
use crate::repo;
use crate::time::now_ms;

/// Grocery-list maintenance driven by an inventory quantity transition.
/// Runs inline in the request that changed the quantity, after the primary
/// mutation has committed. Must never fail that mutation: every error is
/// logged and swallowed here.
pub async fn on_quantity_change(
    pool: &SqlitePool,
    snapshot: &HouseholdSnapshot,
    product: &Product,
    old_qty: i64,
    new_qty: i64,
) {
    if let Err(err) = apply_transition(pool, snapshot, product, old_qty, new_qty).await {
        warn!(
            target = "larder",
            event = "reconcile_failed",
            household_id = %snapshot.household.id,
            product_id = %product.id,
            old_qty = old_qty,
            new_qty = new_qty,
            error = %err
        );
    }
}

async fn apply_transition(
    pool: &SqlitePool,
    snapshot: &HouseholdSnapshot,
    product: &Product,
    old_qty: i64,
    new_qty: i64,
) -> AppResult<()> {
    if !entitlement::is_active(&snapshot.household) {
        // Free households manage their grocery list by hand.
        return Ok(());
    }

    if old_qty > 0 && new_qty == 0 {
        add_on_depletion(pool, snapshot, product).await
    } else if old_qty == 0 && new_qty > 0 {
        remove_on_restock(pool, snapshot, product).await
    } else {
        Ok(())
    }
}

async fn add_on_depletion(
    pool: &SqlitePool,
    snapshot: &HouseholdSnapshot,
    product: &Product,
) -> AppResult<()> {
    let household_id = &snapshot.household.id;
    let normalized = normalized_name(&product.name);
    if let Some(existing) = repo::find_grocery_by_normalized(pool, household_id, &normalized).await?
    {
        debug!(
            target = "larder",
            event = "reconcile_dedupe_hit",
            household_id = %household_id,
            grocery_item_id = %existing.id
        );
        return Ok(());
    }

    let now = now_ms();
    let item = GroceryItem {
        id: new_uuid_v7(),
        household_id: household_id.clone(),
        name: product.name.clone(),
        normalized_name: normalized,
        brand: product.brand.clone(),
        upc: product.upc.clone(),
        created_at: now,
        updated_at: now,
    };
    repo::insert_grocery_item(pool, &item).await?;
    mutation_log::append(
        pool,
        household_id,
        EntityType::GroceryItem,
        &item.id,
        Op::Create,
        &item,
    )
    .await;
    debug!(
        target = "larder",
        event = "reconcile_added_grocery",
        household_id = %household_id,
        grocery_item_id = %item.id
    );
    Ok(())
}

async fn remove_on_restock(
    pool: &SqlitePool,
    snapshot: &HouseholdSnapshot,
    product: &Product,
) -> AppResult<()> {
    let household_id = &snapshot.household.id;
    let normalized = normalized_name(&product.name);
    let matches = repo::find_grocery_matching(pool, household_id, &normalized, None).await?;
    for item in matches {
        if repo::delete_grocery_item(pool, household_id, &item.id).await? {
            mutation_log::append(
                pool,
                household_id,
                EntityType::GroceryItem,
                &item.id,
                Op::Delete,
                &serde_json::json!({ "id": item.id }),
            )
            .await;
            debug!(
                target = "larder",
                event = "reconcile_removed_grocery",
                household_id = %household_id,
                grocery_item_id = %item.id
            );
        }
    }
    Ok(())
}
