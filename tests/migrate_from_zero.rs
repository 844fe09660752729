use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;

#[tokio::test]
async fn fresh_database_migrates_and_reruns_are_no_ops() -> Result<()> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    larder::migrate::apply_migrations(&pool).await?;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )
    .fetch_all(&pool)
    .await?;
    for expected in [
        "household",
        "household_members",
        "products",
        "locations",
        "inventory_items",
        "grocery_items",
        "mutation_log",
        "schema_migrations",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
    }

    // Second run skips everything it already applied.
    larder::migrate::apply_migrations(&pool).await?;
    let status = larder::migrate::status(&pool).await?;
    assert!(status.iter().all(|(_, applied)| *applied));
    Ok(())
}

#[tokio::test]
async fn edited_migration_is_refused() -> Result<()> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    larder::migrate::apply_migrations(&pool).await?;

    sqlx::query("UPDATE schema_migrations SET checksum = 'tampered' WHERE version = (SELECT version FROM schema_migrations LIMIT 1)")
        .execute(&pool)
        .await?;

    let err = larder::migrate::apply_migrations(&pool).await.unwrap_err();
    assert!(err.to_string().contains("edited after application"));
    Ok(())
}

#[tokio::test]
async fn quantity_check_constraint_backs_the_zero_row_invariant() -> Result<()> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    larder::migrate::apply_migrations(&pool).await?;

    sqlx::query(
        "INSERT INTO household (id, name, is_premium, premium_expires_at, created_at, updated_at)
         VALUES ('H', 'h', 0, NULL, 0, 0)",
    )
    .execute(&pool)
    .await?;
    sqlx::query(
        "INSERT INTO locations (id, household_id, name, created_at, updated_at) VALUES ('l', 'H', 'l', 0, 0)",
    )
    .execute(&pool)
    .await?;
    sqlx::query(
        "INSERT INTO products (id, household_id, name, brand, upc, created_at, updated_at) VALUES ('p', 'H', 'p', NULL, NULL, 0, 0)",
    )
    .execute(&pool)
    .await?;

    let res = sqlx::query(
        "INSERT INTO inventory_items (id, household_id, product_id, location_id, quantity, expires_at, created_at, updated_at)
         VALUES ('i', 'H', 'p', 'l', 0, NULL, 0, 0)",
    )
    .execute(&pool)
    .await;
    assert!(res.is_err(), "zero-quantity rows must not be insertable");
    Ok(())
}
