use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::model::{EntityType, GroceryItem, InventoryItem, MutationLogEntry, Op, Product};
use crate::sync::{ChangeFeedPage, FullSnapshot};

const CURSOR_KEY: &str = "cursor";

/// Device-local mirror of the household's synced state plus the change-feed
/// cursor. Shares the client database with [`crate::queue::ActionQueue`];
/// call `queue::init_client_db` (or construct the queue first) before use.
pub struct ClientCache {
    pool: SqlitePool,
}

impl ClientCache {
    pub fn new(pool: SqlitePool) -> ClientCache {
        ClientCache { pool }
    }

    /// Replace the mirror with a full server snapshot. The cursor is left
    /// alone: snapshots carry no log position, and replaying the feed over a
    /// fresh bootstrap is harmless because application is idempotent.
    pub async fn bootstrap(&self, snapshot: &FullSnapshot) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        sqlx::query("DELETE FROM products")
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
        sqlx::query("DELETE FROM inventory_items")
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
        for product in &snapshot.products {
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
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
        }
        for item in &snapshot.inventory {
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
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
        }
        tx.commit().await.map_err(AppError::from)?;
        Ok(())
    }

    /// Apply a feed page in order, then advance the cursor to the last entry
    /// consumed.
    pub async fn apply_page(&self, page: &ChangeFeedPage) -> AppResult<()> {
        for entry in &page.changes {
            self.apply(entry).await?;
        }
        if let Some(last) = page.changes.last() {
            self.set_cursor(last.seq).await?;
        }
        Ok(())
    }

    /// Apply one log entry. Upserts are keyed by entity id and deletes are
    /// delete-if-present, so replaying an entry is a no-op.
    pub async fn apply(&self, entry: &MutationLogEntry) -> AppResult<()> {
        let Some(entity_type) = EntityType::parse(&entry.entity_type) else {
            debug!(
                target = "larder",
                event = "cache_skip_entry",
                entity_type = %entry.entity_type,
                seq = entry.seq
            );
            return Ok(());
        };
        let Some(op) = Op::parse(&entry.op) else {
            debug!(target = "larder", event = "cache_skip_entry", op = %entry.op, seq = entry.seq);
            return Ok(());
        };

        match (entity_type, op) {
            (EntityType::Product, Op::Create | Op::Update) => {
                let product: Product =
                    serde_json::from_str(&entry.payload).map_err(AppError::from)?;
                self.upsert_product(&product).await
            }
            (EntityType::Product, Op::Delete) => {
                self.delete_by_id("products", &entry.entity_id).await
            }
            (EntityType::InventoryItem, Op::Create | Op::Update) => {
                let item: InventoryItem =
                    serde_json::from_str(&entry.payload).map_err(AppError::from)?;
                self.upsert_inventory_item(&item).await
            }
            (EntityType::InventoryItem, Op::Delete) => {
                self.delete_by_id("inventory_items", &entry.entity_id).await
            }
            (EntityType::GroceryItem, Op::Create | Op::Update) => {
                let item: GroceryItem =
                    serde_json::from_str(&entry.payload).map_err(AppError::from)?;
                self.upsert_grocery_item(&item).await
            }
            (EntityType::GroceryItem, Op::Delete) => {
                self.delete_by_id("grocery_items", &entry.entity_id).await
            }
            // Household/member changes don't materialize in the mirror;
            // entitlement is read from the account surface, not the cache.
            (EntityType::Household | EntityType::HouseholdMember | EntityType::Location, _) => {
                debug!(
                    target = "larder",
                    event = "cache_skip_entry",
                    entity_type = %entry.entity_type,
                    seq = entry.seq
                );
                Ok(())
            }
        }
    }

    pub async fn cursor(&self) -> AppResult<i64> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM sync_state WHERE key = ?")
                .bind(CURSOR_KEY)
                .fetch_optional(&self.pool)
                .await
                .map_err(AppError::from)?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    pub async fn set_cursor(&self, seq: i64) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO sync_state (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(CURSOR_KEY)
        .bind(seq.to_string())
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    pub async fn products(&self) -> AppResult<Vec<Product>> {
        sqlx::query_as::<_, Product>(
            "SELECT id, household_id, name, brand, upc, created_at, updated_at
             FROM products ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }

    pub async fn inventory_items(&self) -> AppResult<Vec<InventoryItem>> {
        sqlx::query_as::<_, InventoryItem>(
            "SELECT id, household_id, product_id, location_id, quantity, expires_at, created_at, updated_at
             FROM inventory_items ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }

    pub async fn grocery_items(&self) -> AppResult<Vec<GroceryItem>> {
        sqlx::query_as::<_, GroceryItem>(
            "SELECT id, household_id, name, normalized_name, brand, upc, created_at, updated_at
             FROM grocery_items ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }

    async fn upsert_product(&self, product: &Product) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO products (id, household_id, name, brand, upc, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               name = excluded.name,
               brand = excluded.brand,
               upc = excluded.upc,
               updated_at = excluded.updated_at",
        )
        .bind(&product.id)
        .bind(&product.household_id)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(&product.upc)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn upsert_inventory_item(&self, item: &InventoryItem) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO inventory_items (id, household_id, product_id, location_id, quantity, expires_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               product_id = excluded.product_id,
               location_id = excluded.location_id,
               quantity = excluded.quantity,
               expires_at = excluded.expires_at,
               updated_at = excluded.updated_at",
        )
        .bind(&item.id)
        .bind(&item.household_id)
        .bind(&item.product_id)
        .bind(&item.location_id)
        .bind(item.quantity)
        .bind(item.expires_at)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn upsert_grocery_item(&self, item: &GroceryItem) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO grocery_items (id, household_id, name, normalized_name, brand, upc, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               name = excluded.name,
               normalized_name = excluded.normalized_name,
               brand = excluded.brand,
               upc = excluded.upc,
               updated_at = excluded.updated_at",
        )
        .bind(&item.id)
        .bind(&item.household_id)
        .bind(&item.name)
        .bind(&item.normalized_name)
        .bind(&item.brand)
        .bind(&item.upc)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn delete_by_id(&self, table: &str, id: &str) -> AppResult<()> {
        let sql = format!("DELETE FROM {table} WHERE id = ?");
        sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}
