use futures::FutureExt;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::db::run_in_tx;
use crate::error::{AppError, AppResult};
use crate::gate::{self, Collection};
use crate::id::new_uuid_v7;
use crate::model::{
    normalized_name, EntityType, GroceryItem, Household, HouseholdMember, InventoryItem,
    InventoryItemPatch, Location, NewGroceryItem, NewInventoryItem, NewLocation, NewProduct, Op,
    Product, QuantityAdjustment, INVALID_LOCATION, INVALID_QUANTITY, LOCATION_REQUIRED,
    NAME_REQUIRED, NOT_FOUND, UNSUPPORTED_ACTION,
};
use crate::mutation_log;
use crate::queue::{ActionOp, QueuedAction};
use crate::reconcile;
use crate::repo;
use crate::sync::{self, ChangeFeedPage, FullSnapshot};
use crate::time::now_ms;

fn op_ctx(err: AppError, operation: &'static str, household_id: &str) -> AppError {
    err.with_context("operation", operation)
        .with_context("household_id", household_id.to_string())
}

// --- sync surface (pure reads, never gated) ---------------------------------

pub async fn sync_full(pool: &SqlitePool, household_id: &str) -> AppResult<FullSnapshot> {
    // Confirms the household exists but deliberately skips the gate: free
    // multi-member households still pull the feed.
    repo::household_snapshot(pool, household_id).await?;
    sync::full_snapshot(pool, household_id)
        .await
        .map_err(|err| op_ctx(err, "sync_full", household_id))
}

pub async fn sync_changes(
    pool: &SqlitePool,
    household_id: &str,
    since: i64,
) -> AppResult<ChangeFeedPage> {
    repo::household_snapshot(pool, household_id).await?;
    sync::changes_since(pool, household_id, since)
        .await
        .map_err(|err| op_ctx(err, "sync_changes", household_id))
}

// --- inventory --------------------------------------------------------------

pub async fn inventory_create(
    pool: &SqlitePool,
    household_id: &str,
    data: NewInventoryItem,
) -> AppResult<InventoryItem> {
    let snapshot = repo::household_snapshot(pool, household_id).await?;
    gate::admit_write(&snapshot)
        .map_err(|r| op_ctx(AppError::from(r), "inventory_create", household_id))?;

    // A client retrying a delivered create resends the same id; acknowledge
    // without applying twice.
    if let Some(id) = data.id.as_deref() {
        if let Some(existing) = repo::get_inventory_item(pool, household_id, id).await? {
            return Ok(existing);
        }
    }

    let product = repo::get_product(pool, household_id, &data.product_id)
        .await?
        .ok_or_else(|| {
            AppError::new(NOT_FOUND, "Product not found")
                .with_context("product_id", data.product_id.clone())
        })?;

    let location_id = match data.location_id.as_deref() {
        None | Some("") => {
            return Err(op_ctx(
                AppError::new(LOCATION_REQUIRED, "Inventory items need a storage location"),
                "inventory_create",
                household_id,
            ))
        }
        Some(value) => value.to_string(),
    };
    if !repo::location_exists(pool, household_id, &location_id).await? {
        return Err(op_ctx(
            AppError::new(INVALID_LOCATION, "Unknown storage location")
                .with_context("location_id", location_id),
            "inventory_create",
            household_id,
        ));
    }

    if data.quantity < 1 {
        return Err(op_ctx(
            AppError::new(INVALID_QUANTITY, "Quantity must be at least 1")
                .with_context("quantity", data.quantity.to_string()),
            "inventory_create",
            household_id,
        ));
    }

    let current = repo::count_inventory(pool, household_id).await?;
    gate::admit_insert(&snapshot, Collection::Inventory, current)
        .map_err(|r| op_ctx(AppError::from(r), "inventory_create", household_id))?;

    let now = now_ms();
    let item = InventoryItem {
        id: data.id.unwrap_or_else(new_uuid_v7),
        household_id: household_id.to_string(),
        product_id: product.id.clone(),
        location_id,
        quantity: data.quantity,
        expires_at: data.expires_at,
        created_at: now,
        updated_at: now,
    };
    sqlx::query(
        "INSERT INTO inventory_items (id, household_id, product_id, location_id, quantity, expires_at, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&item.id)
    .bind(&item.household_id)
    .bind(&item.product_id)
    .bind(&item.location_id)
    .bind(item.quantity)
    .bind(item.expires_at)
    .bind(item.created_at)
    .bind(item.updated_at)
    .execute(pool)
    .await
    .map_err(|err| op_ctx(AppError::from(err), "inventory_create", household_id))?;

    mutation_log::append(
        pool,
        household_id,
        EntityType::InventoryItem,
        &item.id,
        Op::Create,
        &item,
    )
    .await;

    // A fresh row is an old-quantity-zero transition: restocking something
    // that was on the grocery list crosses it off for premium households.
    reconcile::on_quantity_change(pool, &snapshot, &product, 0, item.quantity).await;

    Ok(item)
}

pub async fn inventory_update(
    pool: &SqlitePool,
    household_id: &str,
    id: &str,
    patch: InventoryItemPatch,
) -> AppResult<Option<InventoryItem>> {
    let snapshot = repo::household_snapshot(pool, household_id).await?;
    gate::admit_write(&snapshot)
        .map_err(|r| op_ctx(AppError::from(r), "inventory_update", household_id))?;

    if let Some(location_id) = patch.location_id.as_deref() {
        if location_id.is_empty() {
            return Err(op_ctx(
                AppError::new(LOCATION_REQUIRED, "Inventory items need a storage location"),
                "inventory_update",
                household_id,
            ));
        }
        if !repo::location_exists(pool, household_id, location_id).await? {
            return Err(op_ctx(
                AppError::new(INVALID_LOCATION, "Unknown storage location")
                    .with_context("location_id", location_id.to_string()),
                "inventory_update",
                household_id,
            ));
        }
    }
    if let Some(quantity) = patch.quantity {
        if quantity < 0 {
            return Err(op_ctx(
                AppError::new(INVALID_QUANTITY, "Quantity cannot be negative")
                    .with_context("quantity", quantity.to_string()),
                "inventory_update",
                household_id,
            ));
        }
    }

    let now = now_ms();
    let (before, after) = {
        let op_household = household_id;
        let household_id = household_id.to_string();
        let id = id.to_string();
        let patch = patch.clone();
        run_in_tx::<_, AppError, _>(pool, move |tx: &mut Transaction<'static, Sqlite>| {
            async move {
                let before = sqlx::query_as::<_, InventoryItem>(
                    "SELECT id, household_id, product_id, location_id, quantity, expires_at, created_at, updated_at
                     FROM inventory_items WHERE household_id = ? AND id = ?",
                )
                .bind(&household_id)
                .bind(&id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(AppError::from)?
                .ok_or_else(|| {
                    AppError::new(NOT_FOUND, "Inventory item not found").with_context("id", id.clone())
                })?;

                let mut after = before.clone();
                if let Some(location_id) = patch.location_id {
                    after.location_id = location_id;
                }
                if let Some(expires_at) = patch.expires_at {
                    after.expires_at = Some(expires_at);
                }
                if let Some(quantity) = patch.quantity {
                    after.quantity = quantity;
                }
                after.updated_at = now;

                if after.quantity == 0 {
                    sqlx::query("DELETE FROM inventory_items WHERE household_id = ? AND id = ?")
                        .bind(&household_id)
                        .bind(&id)
                        .execute(&mut **tx)
                        .await
                        .map_err(AppError::from)?;
                } else {
                    sqlx::query(
                        "UPDATE inventory_items
                         SET location_id = ?, quantity = ?, expires_at = ?, updated_at = ?
                         WHERE household_id = ? AND id = ?",
                    )
                    .bind(&after.location_id)
                    .bind(after.quantity)
                    .bind(after.expires_at)
                    .bind(after.updated_at)
                    .bind(&household_id)
                    .bind(&id)
                    .execute(&mut **tx)
                    .await
                    .map_err(AppError::from)?;
                }
                Ok((before, after))
            }
            .boxed()
        })
        .await
        .map_err(|err| op_ctx(err, "inventory_update", op_household))?
    };

    if after.quantity == 0 {
        mutation_log::append(
            pool,
            household_id,
            EntityType::InventoryItem,
            id,
            Op::Delete,
            &serde_json::json!({ "id": id }),
        )
        .await;
    } else {
        mutation_log::append(
            pool,
            household_id,
            EntityType::InventoryItem,
            id,
            Op::Update,
            &after,
        )
        .await;
    }

    if before.quantity != after.quantity {
        if let Some(product) = repo::get_product(pool, household_id, &before.product_id).await? {
            reconcile::on_quantity_change(pool, &snapshot, &product, before.quantity, after.quantity)
                .await;
        }
    }

    Ok(if after.quantity == 0 { None } else { Some(after) })
}

/// Relative quantity change (consume/restock). Clamps at zero; a result of
/// zero deletes the row so no zero-quantity inventory ever persists.
pub async fn inventory_adjust_quantity(
    pool: &SqlitePool,
    household_id: &str,
    id: &str,
    delta: i64,
) -> AppResult<Option<InventoryItem>> {
    let snapshot = repo::household_snapshot(pool, household_id).await?;
    gate::admit_write(&snapshot)
        .map_err(|r| op_ctx(AppError::from(r), "inventory_adjust_quantity", household_id))?;

    let now = now_ms();
    let (before, after) = {
        let op_household = household_id;
        let household_id = household_id.to_string();
        let id = id.to_string();
        run_in_tx::<_, AppError, _>(pool, move |tx: &mut Transaction<'static, Sqlite>| {
            async move {
                let before = sqlx::query_as::<_, InventoryItem>(
                    "SELECT id, household_id, product_id, location_id, quantity, expires_at, created_at, updated_at
                     FROM inventory_items WHERE household_id = ? AND id = ?",
                )
                .bind(&household_id)
                .bind(&id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(AppError::from)?
                .ok_or_else(|| {
                    AppError::new(NOT_FOUND, "Inventory item not found").with_context("id", id.clone())
                })?;

                let new_qty = (before.quantity + delta).max(0);
                if new_qty == 0 {
                    sqlx::query("DELETE FROM inventory_items WHERE household_id = ? AND id = ?")
                        .bind(&household_id)
                        .bind(&id)
                        .execute(&mut **tx)
                        .await
                        .map_err(AppError::from)?;
                } else if new_qty != before.quantity {
                    sqlx::query(
                        "UPDATE inventory_items SET quantity = ?, updated_at = ? WHERE household_id = ? AND id = ?",
                    )
                    .bind(new_qty)
                    .bind(now)
                    .bind(&household_id)
                    .bind(&id)
                    .execute(&mut **tx)
                    .await
                    .map_err(AppError::from)?;
                }

                let mut after = before.clone();
                after.quantity = new_qty;
                after.updated_at = now;
                Ok((before, after))
            }
            .boxed()
        })
        .await
        .map_err(|err| op_ctx(err, "inventory_adjust_quantity", op_household))?
    };

    if after.quantity == 0 {
        mutation_log::append(
            pool,
            household_id,
            EntityType::InventoryItem,
            id,
            Op::Delete,
            &serde_json::json!({ "id": id }),
        )
        .await;
    } else if after.quantity != before.quantity {
        mutation_log::append(
            pool,
            household_id,
            EntityType::InventoryItem,
            id,
            Op::Update,
            &after,
        )
        .await;
    }

    if before.quantity != after.quantity {
        if let Some(product) = repo::get_product(pool, household_id, &before.product_id).await? {
            reconcile::on_quantity_change(pool, &snapshot, &product, before.quantity, after.quantity)
                .await;
        }
    }

    Ok(if after.quantity == 0 { None } else { Some(after) })
}

/// Explicit removal. Not a depletion, so the grocery list is left alone.
/// Idempotent: deleting an already-deleted row acknowledges quietly, which
/// keeps duplicate queue deliveries harmless.
pub async fn inventory_delete(pool: &SqlitePool, household_id: &str, id: &str) -> AppResult<bool> {
    let snapshot = repo::household_snapshot(pool, household_id).await?;
    gate::admit_write(&snapshot)
        .map_err(|r| op_ctx(AppError::from(r), "inventory_delete", household_id))?;

    let res = sqlx::query("DELETE FROM inventory_items WHERE household_id = ? AND id = ?")
        .bind(household_id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|err| op_ctx(AppError::from(err), "inventory_delete", household_id))?;
    let deleted = res.rows_affected() > 0;
    if deleted {
        mutation_log::append(
            pool,
            household_id,
            EntityType::InventoryItem,
            id,
            Op::Delete,
            &serde_json::json!({ "id": id }),
        )
        .await;
    }
    Ok(deleted)
}

// --- grocery ----------------------------------------------------------------

pub async fn grocery_list(pool: &SqlitePool, household_id: &str) -> AppResult<Vec<GroceryItem>> {
    repo::household_snapshot(pool, household_id).await?;
    sqlx::query_as::<_, GroceryItem>(
        "SELECT id, household_id, name, normalized_name, brand, upc, created_at, updated_at
         FROM grocery_items WHERE household_id = ? ORDER BY normalized_name, id",
    )
    .bind(household_id)
    .fetch_all(pool)
    .await
    .map_err(|err| op_ctx(AppError::from(err), "grocery_list", household_id))
}

pub async fn grocery_add(
    pool: &SqlitePool,
    household_id: &str,
    data: NewGroceryItem,
) -> AppResult<GroceryItem> {
    let snapshot = repo::household_snapshot(pool, household_id).await?;
    gate::admit_write(&snapshot)
        .map_err(|r| op_ctx(AppError::from(r), "grocery_add", household_id))?;

    if let Some(id) = data.id.as_deref() {
        if let Some(existing) = repo::get_grocery_item(pool, household_id, id).await? {
            return Ok(existing);
        }
    }

    let normalized = normalized_name(&data.name);
    if normalized.is_empty() {
        return Err(op_ctx(
            AppError::new(NAME_REQUIRED, "Grocery items need a name"),
            "grocery_add",
            household_id,
        ));
    }

    // Lookup-before-insert dedupe: one row per normalized name. A concurrent
    // insert can still race this check; accepted soft behavior.
    if let Some(existing) = repo::find_grocery_by_normalized(pool, household_id, &normalized).await?
    {
        return Ok(existing);
    }

    let current = repo::count_grocery(pool, household_id).await?;
    gate::admit_insert(&snapshot, Collection::Grocery, current)
        .map_err(|r| op_ctx(AppError::from(r), "grocery_add", household_id))?;

    let now = now_ms();
    let item = GroceryItem {
        id: data.id.unwrap_or_else(new_uuid_v7),
        household_id: household_id.to_string(),
        name: data.name,
        normalized_name: normalized,
        brand: data.brand,
        upc: data.upc,
        created_at: now,
        updated_at: now,
    };
    repo::insert_grocery_item(pool, &item)
        .await
        .map_err(|err| op_ctx(err, "grocery_add", household_id))?;

    mutation_log::append(
        pool,
        household_id,
        EntityType::GroceryItem,
        &item.id,
        Op::Create,
        &item,
    )
    .await;

    Ok(item)
}

/// Idempotent like `inventory_delete`.
pub async fn grocery_remove(pool: &SqlitePool, household_id: &str, id: &str) -> AppResult<bool> {
    let snapshot = repo::household_snapshot(pool, household_id).await?;
    gate::admit_write(&snapshot)
        .map_err(|r| op_ctx(AppError::from(r), "grocery_remove", household_id))?;

    let deleted = repo::delete_grocery_item(pool, household_id, id)
        .await
        .map_err(|err| op_ctx(err, "grocery_remove", household_id))?;
    if deleted {
        mutation_log::append(
            pool,
            household_id,
            EntityType::GroceryItem,
            id,
            Op::Delete,
            &serde_json::json!({ "id": id }),
        )
        .await;
    }
    Ok(deleted)
}

/// Cross-off used by add flows outside reconciliation: buying something
/// removes it from the list whether matched by UPC or by name.
pub async fn grocery_remove_matching(
    pool: &SqlitePool,
    household_id: &str,
    name: &str,
    upc: Option<&str>,
) -> AppResult<usize> {
    let snapshot = repo::household_snapshot(pool, household_id).await?;
    gate::admit_write(&snapshot)
        .map_err(|r| op_ctx(AppError::from(r), "grocery_remove_matching", household_id))?;

    let normalized = normalized_name(name);
    let matches = repo::find_grocery_matching(pool, household_id, &normalized, upc).await?;
    let mut removed = 0;
    for item in matches {
        if repo::delete_grocery_item(pool, household_id, &item.id).await? {
            removed += 1;
            mutation_log::append(
                pool,
                household_id,
                EntityType::GroceryItem,
                &item.id,
                Op::Delete,
                &serde_json::json!({ "id": item.id }),
            )
            .await;
        }
    }
    Ok(removed)
}

// --- catalog ----------------------------------------------------------------

pub async fn product_create(
    pool: &SqlitePool,
    household_id: &str,
    data: NewProduct,
) -> AppResult<Product> {
    let snapshot = repo::household_snapshot(pool, household_id).await?;
    gate::admit_write(&snapshot)
        .map_err(|r| op_ctx(AppError::from(r), "product_create", household_id))?;

    if let Some(id) = data.id.as_deref() {
        if let Some(existing) = repo::get_product(pool, household_id, id).await? {
            return Ok(existing);
        }
    }
    if data.name.trim().is_empty() {
        return Err(op_ctx(
            AppError::new(NAME_REQUIRED, "Products need a name"),
            "product_create",
            household_id,
        ));
    }

    let now = now_ms();
    let product = Product {
        id: data.id.unwrap_or_else(new_uuid_v7),
        household_id: household_id.to_string(),
        name: data.name,
        brand: data.brand,
        upc: data.upc,
        created_at: now,
        updated_at: now,
    };
    sqlx::query(
        "INSERT INTO products (id, household_id, name, brand, upc, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&product.id)
    .bind(&product.household_id)
    .bind(&product.name)
    .bind(&product.brand)
    .bind(&product.upc)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(pool)
    .await
    .map_err(|err| op_ctx(AppError::from(err), "product_create", household_id))?;

    mutation_log::append(
        pool,
        household_id,
        EntityType::Product,
        &product.id,
        Op::Create,
        &product,
    )
    .await;

    Ok(product)
}

pub async fn location_create(
    pool: &SqlitePool,
    household_id: &str,
    data: NewLocation,
) -> AppResult<Location> {
    let snapshot = repo::household_snapshot(pool, household_id).await?;
    gate::admit_write(&snapshot)
        .map_err(|r| op_ctx(AppError::from(r), "location_create", household_id))?;

    if let Some(id) = data.id.as_deref() {
        if let Some(existing) = repo::get_location(pool, household_id, id).await? {
            return Ok(existing);
        }
    }
    if data.name.trim().is_empty() {
        return Err(op_ctx(
            AppError::new(NAME_REQUIRED, "Locations need a name"),
            "location_create",
            household_id,
        ));
    }

    let now = now_ms();
    let location = Location {
        id: data.id.unwrap_or_else(new_uuid_v7),
        household_id: household_id.to_string(),
        name: data.name,
        created_at: now,
        updated_at: now,
    };
    sqlx::query(
        "INSERT INTO locations (id, household_id, name, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&location.id)
    .bind(&location.household_id)
    .bind(&location.name)
    .bind(location.created_at)
    .bind(location.updated_at)
    .execute(pool)
    .await
    .map_err(|err| op_ctx(AppError::from(err), "location_create", household_id))?;

    mutation_log::append(
        pool,
        household_id,
        EntityType::Location,
        &location.id,
        Op::Create,
        &location,
    )
    .await;

    Ok(location)
}

// --- household --------------------------------------------------------------

/// Member management is account plumbing, not household content, so it skips
/// the write gate: a free two-member household must be able to shrink back to
/// one member and regain write access.
pub async fn member_add(
    pool: &SqlitePool,
    household_id: &str,
    name: &str,
) -> AppResult<HouseholdMember> {
    repo::household_snapshot(pool, household_id).await?;
    let now = now_ms();
    let member = HouseholdMember {
        id: new_uuid_v7(),
        household_id: household_id.to_string(),
        name: name.to_string(),
        created_at: now,
        updated_at: now,
    };
    sqlx::query(
        "INSERT INTO household_members (id, household_id, name, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&member.id)
    .bind(&member.household_id)
    .bind(&member.name)
    .bind(member.created_at)
    .bind(member.updated_at)
    .execute(pool)
    .await
    .map_err(|err| op_ctx(AppError::from(err), "member_add", household_id))?;

    mutation_log::append(
        pool,
        household_id,
        EntityType::HouseholdMember,
        &member.id,
        Op::Create,
        &member,
    )
    .await;

    Ok(member)
}

pub async fn member_remove(pool: &SqlitePool, household_id: &str, id: &str) -> AppResult<bool> {
    repo::household_snapshot(pool, household_id).await?;
    let res = sqlx::query("DELETE FROM household_members WHERE household_id = ? AND id = ?")
        .bind(household_id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|err| op_ctx(AppError::from(err), "member_remove", household_id))?;
    let deleted = res.rows_affected() > 0;
    if deleted {
        mutation_log::append(
            pool,
            household_id,
            EntityType::HouseholdMember,
            id,
            Op::Delete,
            &serde_json::json!({ "id": id }),
        )
        .await;
    }
    Ok(deleted)
}

/// Written by the subscription-validation collaborator; everything here just
/// reads these two fields through fresh snapshots.
pub async fn set_premium(
    pool: &SqlitePool,
    household_id: &str,
    is_premium: bool,
    premium_expires_at: Option<i64>,
) -> AppResult<Household> {
    repo::household_snapshot(pool, household_id).await?;
    sqlx::query(
        "UPDATE household SET is_premium = ?, premium_expires_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(is_premium)
    .bind(premium_expires_at)
    .bind(now_ms())
    .bind(household_id)
    .execute(pool)
    .await
    .map_err(|err| op_ctx(AppError::from(err), "set_premium", household_id))?;

    let household = repo::household_snapshot(pool, household_id).await?.household;
    mutation_log::append(
        pool,
        household_id,
        EntityType::Household,
        household_id,
        Op::Update,
        &household,
    )
    .await;
    Ok(household)
}

// --- queued-action dispatch -------------------------------------------------

/// Server entry point for a client's queued action: the single surface the
/// transports deliver to. Routes to the typed command for the entity/op pair.
pub async fn apply_action(
    pool: &SqlitePool,
    household_id: &str,
    action: &QueuedAction,
) -> AppResult<()> {
    let entity = EntityType::parse(&action.entity_type);
    let op = ActionOp::parse(&action.op);
    match (entity, op) {
        (Some(EntityType::InventoryItem), Some(ActionOp::Create)) => {
            let mut data: NewInventoryItem =
                serde_json::from_str(&action.payload).map_err(AppError::from)?;
            data.id = Some(action.entity_id.clone());
            inventory_create(pool, household_id, data).await?;
            Ok(())
        }
        (Some(EntityType::InventoryItem), Some(ActionOp::Update)) => {
            let patch: InventoryItemPatch =
                serde_json::from_str(&action.payload).map_err(AppError::from)?;
            inventory_update(pool, household_id, &action.entity_id, patch).await?;
            Ok(())
        }
        (Some(EntityType::InventoryItem), Some(ActionOp::Adjust)) => {
            let adj: QuantityAdjustment =
                serde_json::from_str(&action.payload).map_err(AppError::from)?;
            inventory_adjust_quantity(pool, household_id, &action.entity_id, adj.delta).await?;
            Ok(())
        }
        (Some(EntityType::InventoryItem), Some(ActionOp::Delete)) => {
            inventory_delete(pool, household_id, &action.entity_id).await?;
            Ok(())
        }
        (Some(EntityType::GroceryItem), Some(ActionOp::Create)) => {
            let mut data: NewGroceryItem =
                serde_json::from_str(&action.payload).map_err(AppError::from)?;
            data.id = Some(action.entity_id.clone());
            grocery_add(pool, household_id, data).await?;
            Ok(())
        }
        (Some(EntityType::GroceryItem), Some(ActionOp::Delete)) => {
            grocery_remove(pool, household_id, &action.entity_id).await?;
            Ok(())
        }
        (Some(EntityType::Product), Some(ActionOp::Create)) => {
            let mut data: NewProduct =
                serde_json::from_str(&action.payload).map_err(AppError::from)?;
            data.id = Some(action.entity_id.clone());
            product_create(pool, household_id, data).await?;
            Ok(())
        }
        (Some(EntityType::Location), Some(ActionOp::Create)) => {
            let mut data: NewLocation =
                serde_json::from_str(&action.payload).map_err(AppError::from)?;
            data.id = Some(action.entity_id.clone());
            location_create(pool, household_id, data).await?;
            Ok(())
        }
        _ => Err(AppError::new(
            UNSUPPORTED_ACTION,
            "No server operation for this entity/op pair",
        )
        .with_context("entity_type", action.entity_type.clone())
        .with_context("op", action.op.clone())),
    }
}
