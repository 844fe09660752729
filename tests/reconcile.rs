use anyhow::Result;
use larder::commands;
use larder::model::{InventoryItemPatch, NewInventoryItem};

#[path = "util.rs"]
mod util;

fn new_item(product_id: &str, quantity: i64) -> NewInventoryItem {
    NewInventoryItem {
        id: None,
        product_id: product_id.into(),
        location_id: Some("pantry".into()),
        quantity,
        expires_at: None,
    }
}

async fn premium_household_with_milk(pool: &sqlx::SqlitePool) {
    util::seed_household(pool, "H", 1, true, None).await;
    util::seed_location(pool, "H", "pantry").await;
    util::seed_product(pool, "H", "p-milk", "Milk").await;
}

#[tokio::test]
async fn depleting_the_last_unit_adds_a_grocery_item() -> Result<()> {
    let pool = util::temp_pool().await;
    premium_household_with_milk(&pool).await;
    let item = commands::inventory_create(&pool, "H", new_item("p-milk", 1)).await?;

    let result = commands::inventory_adjust_quantity(&pool, "H", &item.id, -1).await?;
    assert!(result.is_none(), "row deleted at zero");
    assert_eq!(util::inventory_count(&pool, "H").await, 0);
    assert_eq!(util::grocery_names(&pool, "H").await, vec!["milk".to_string()]);
    Ok(())
}

#[tokio::test]
async fn restocking_removes_the_grocery_item() -> Result<()> {
    let pool = util::temp_pool().await;
    premium_household_with_milk(&pool).await;
    let item = commands::inventory_create(&pool, "H", new_item("p-milk", 1)).await?;
    commands::inventory_adjust_quantity(&pool, "H", &item.id, -1).await?;
    assert_eq!(util::grocery_names(&pool, "H").await, vec!["milk".to_string()]);

    // Quick-add the product back: a fresh row is a zero-to-positive transition.
    commands::inventory_create(&pool, "H", new_item("p-milk", 1)).await?;
    assert!(util::grocery_names(&pool, "H").await.is_empty());
    assert_eq!(util::inventory_count(&pool, "H").await, 1);
    Ok(())
}

#[tokio::test]
async fn depletion_dedupes_against_an_existing_grocery_row() -> Result<()> {
    let pool = util::temp_pool().await;
    premium_household_with_milk(&pool).await;
    util::seed_grocery_item(&pool, "H", "g-milk", "MILK  ").await;
    let item = commands::inventory_create(&pool, "H", new_item("p-milk", 1)).await?;

    commands::inventory_adjust_quantity(&pool, "H", &item.id, -1).await?;
    // Still exactly one row for the normalized name.
    assert_eq!(util::grocery_names(&pool, "H").await, vec!["milk".to_string()]);
    Ok(())
}

#[tokio::test]
async fn free_household_gets_no_automatic_reconciliation() -> Result<()> {
    let pool = util::temp_pool().await;
    util::seed_household(&pool, "H", 1, false, None).await;
    util::seed_location(&pool, "H", "pantry").await;
    util::seed_product(&pool, "H", "p-milk", "Milk").await;
    let item = commands::inventory_create(&pool, "H", new_item("p-milk", 1)).await?;

    commands::inventory_adjust_quantity(&pool, "H", &item.id, -1).await?;
    assert_eq!(util::inventory_count(&pool, "H").await, 0);
    assert!(util::grocery_names(&pool, "H").await.is_empty());
    Ok(())
}

#[tokio::test]
async fn explicit_delete_is_not_a_depletion() -> Result<()> {
    let pool = util::temp_pool().await;
    premium_household_with_milk(&pool).await;
    let item = commands::inventory_create(&pool, "H", new_item("p-milk", 2)).await?;

    assert!(commands::inventory_delete(&pool, "H", &item.id).await?);
    assert_eq!(util::inventory_count(&pool, "H").await, 0);
    assert!(util::grocery_names(&pool, "H").await.is_empty());
    Ok(())
}

#[tokio::test]
async fn over_decrement_clamps_at_zero_and_no_zero_rows_persist() -> Result<()> {
    let pool = util::temp_pool().await;
    premium_household_with_milk(&pool).await;
    let item = commands::inventory_create(&pool, "H", new_item("p-milk", 2)).await?;

    let result = commands::inventory_adjust_quantity(&pool, "H", &item.id, -5).await?;
    assert!(result.is_none());
    let low: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory_items WHERE quantity <= 0")
        .fetch_one(&pool)
        .await?;
    assert_eq!(low, 0);
    assert_eq!(util::grocery_names(&pool, "H").await, vec!["milk".to_string()]);
    Ok(())
}

#[tokio::test]
async fn updating_quantity_to_zero_deletes_and_reconciles() -> Result<()> {
    let pool = util::temp_pool().await;
    premium_household_with_milk(&pool).await;
    let item = commands::inventory_create(&pool, "H", new_item("p-milk", 3)).await?;

    let result = commands::inventory_update(
        &pool,
        "H",
        &item.id,
        InventoryItemPatch {
            quantity: Some(0),
            ..Default::default()
        },
    )
    .await?;
    assert!(result.is_none());
    assert_eq!(util::inventory_count(&pool, "H").await, 0);
    assert_eq!(util::grocery_names(&pool, "H").await, vec!["milk".to_string()]);
    Ok(())
}

#[tokio::test]
async fn partial_decrement_has_no_grocery_effect() -> Result<()> {
    let pool = util::temp_pool().await;
    premium_household_with_milk(&pool).await;
    let item = commands::inventory_create(&pool, "H", new_item("p-milk", 3)).await?;

    let result = commands::inventory_adjust_quantity(&pool, "H", &item.id, -1).await?;
    assert_eq!(result.map(|i| i.quantity), Some(2));
    assert!(util::grocery_names(&pool, "H").await.is_empty());
    Ok(())
}

#[tokio::test]
async fn cross_off_matches_by_upc_or_name() -> Result<()> {
    let pool = util::temp_pool().await;
    util::seed_household(&pool, "H", 1, true, None).await;
    util::seed_grocery_item(&pool, "H", "g1", "Oat Milk").await;
    sqlx::query("UPDATE grocery_items SET upc = '0123456789' WHERE id = 'g1'")
        .execute(&pool)
        .await?;

    // Name doesn't match, UPC does.
    let removed =
        commands::grocery_remove_matching(&pool, "H", "Store-brand oats", Some("0123456789"))
            .await?;
    assert_eq!(removed, 1);
    assert!(util::grocery_names(&pool, "H").await.is_empty());
    Ok(())
}
