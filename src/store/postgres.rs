//! Postgres-backed store. Membership sets live in `uuid[]` columns and are
//! mutated in place with single-row `UPDATE`s.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use uuid::Uuid;

use super::{CatalogStore, StoreError, StoreResult};
use crate::domain::aggregates::{Collection, Customer, Order, OrderItem, OrderStatus, Product, ShippingAddress};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone, Debug)]
pub struct PgStore { pool: PgPool }

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: Uuid,
    items: Json<Vec<OrderItem>>,
    total_amount: Decimal,
    shipping_address: Json<ShippingAddress>,
    shipping_rate: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;
    fn try_from(row: OrderRow) -> StoreResult<Self> {
        let status = row.status.parse::<OrderStatus>()
            .map_err(|e| StoreError::Corrupt { id: row.id, reason: e.to_string() })?;
        let mut order = Order::create(row.customer_id, row.items.0, row.total_amount, row.shipping_address.0, row.shipping_rate);
        order.id = row.id;
        order.status = status;
        order.created_at = row.created_at;
        order.updated_at = row.updated_at;
        Ok(order)
    }
}

fn map_write_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => StoreError::Conflict(db.message().to_string()),
        _ => StoreError::Database(e),
    }
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn insert_product(&self, p: &Product) -> StoreResult<()> {
        sqlx::query("INSERT INTO products (id, title, description, media, category, price, old_price, expense, quantity, tags, sizes, colors, material, collections, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)")
            .bind(p.id).bind(&p.title).bind(&p.description).bind(&p.media).bind(&p.category).bind(p.price).bind(p.old_price).bind(p.expense)
            .bind(p.quantity).bind(&p.tags).bind(&p.sizes).bind(&p.colors).bind(&p.material).bind(&p.collections).bind(p.created_at).bind(p.updated_at)
            .execute(&self.pool).await.map_err(map_write_err)?;
        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(&self.pool).await?)
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        Ok(sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY created_at DESC").fetch_all(&self.pool).await?)
    }

    async fn get_products(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        Ok(sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)").bind(ids).fetch_all(&self.pool).await?)
    }

    async fn find_products_in_collection(&self, collection_id: Uuid) -> StoreResult<Vec<Product>> {
        Ok(sqlx::query_as::<_, Product>("SELECT * FROM products WHERE $1 = ANY(collections) ORDER BY created_at DESC")
            .bind(collection_id).fetch_all(&self.pool).await?)
    }

    async fn replace_product(&self, p: &Product) -> StoreResult<bool> {
        let done = sqlx::query("UPDATE products SET title = $2, description = $3, media = $4, category = $5, price = $6, old_price = $7, expense = $8, quantity = $9, tags = $10, sizes = $11, colors = $12, material = $13, collections = $14, updated_at = $15 WHERE id = $1")
            .bind(p.id).bind(&p.title).bind(&p.description).bind(&p.media).bind(&p.category).bind(p.price).bind(p.old_price).bind(p.expense)
            .bind(p.quantity).bind(&p.tags).bind(&p.sizes).bind(&p.colors).bind(&p.material).bind(&p.collections).bind(p.updated_at)
            .execute(&self.pool).await.map_err(map_write_err)?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
        let done = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn remove_collection_from_product(&self, product_id: Uuid, collection_id: Uuid) -> StoreResult<bool> {
        let done = sqlx::query("UPDATE products SET collections = array_remove(collections, $2) WHERE id = $1")
            .bind(product_id).bind(collection_id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn insert_collection(&self, c: &Collection) -> StoreResult<()> {
        sqlx::query("INSERT INTO collections (id, title, description, image, products, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7)")
            .bind(c.id).bind(&c.title).bind(&c.description).bind(&c.image).bind(&c.products).bind(c.created_at).bind(c.updated_at)
            .execute(&self.pool).await.map_err(map_write_err)?;
        Ok(())
    }

    async fn get_collection(&self, id: Uuid) -> StoreResult<Option<Collection>> {
        Ok(sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE id = $1").bind(id).fetch_optional(&self.pool).await?)
    }

    async fn find_collection_by_title(&self, title: &str) -> StoreResult<Option<Collection>> {
        Ok(sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE title = $1").bind(title).fetch_optional(&self.pool).await?)
    }

    async fn list_collections(&self) -> StoreResult<Vec<Collection>> {
        Ok(sqlx::query_as::<_, Collection>("SELECT * FROM collections ORDER BY created_at DESC").fetch_all(&self.pool).await?)
    }

    async fn get_collections(&self, ids: &[Uuid]) -> StoreResult<Vec<Collection>> {
        Ok(sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE id = ANY($1)").bind(ids).fetch_all(&self.pool).await?)
    }

    async fn replace_collection(&self, c: &Collection) -> StoreResult<bool> {
        // `products` is owned by the membership operations below and is never overwritten here.
        let done = sqlx::query("UPDATE collections SET title = $2, description = $3, image = $4, updated_at = $5 WHERE id = $1")
            .bind(c.id).bind(&c.title).bind(&c.description).bind(&c.image).bind(c.updated_at)
            .execute(&self.pool).await.map_err(map_write_err)?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete_collection(&self, id: Uuid) -> StoreResult<bool> {
        let done = sqlx::query("DELETE FROM collections WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn add_product_to_collection(&self, collection_id: Uuid, product_id: Uuid) -> StoreResult<bool> {
        let done = sqlx::query("UPDATE collections SET products = CASE WHEN $2 = ANY(products) THEN products ELSE array_append(products, $2) END WHERE id = $1")
            .bind(collection_id).bind(product_id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn remove_product_from_collection(&self, collection_id: Uuid, product_id: Uuid) -> StoreResult<bool> {
        let done = sqlx::query("UPDATE collections SET products = array_remove(products, $2) WHERE id = $1")
            .bind(collection_id).bind(product_id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        row.map(Order::try_from).transpose()
    }

    async fn list_orders(&self) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders ORDER BY created_at DESC").fetch_all(&self.pool).await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus, updated_at: DateTime<Utc>) -> StoreResult<bool> {
        let done = sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id).bind(status.as_str()).bind(updated_at).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn list_customers(&self) -> StoreResult<Vec<Customer>> {
        Ok(sqlx::query_as::<_, Customer>("SELECT * FROM customers ORDER BY created_at DESC").fetch_all(&self.pool).await?)
    }

    async fn get_customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        Ok(sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1").bind(id).fetch_optional(&self.pool).await?)
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
