//! Store adapter: a thin, logic-free interface over the document store.
//!
//! Every method touches one document (or one row) and is atomic only at that
//! granularity. There are no cross-document transactions; callers that fan
//! out over several documents must tolerate partial application.
//!
//! Membership arrays (`Product::collections`, `Collection::products`) are
//! mutated with add-to-set semantics: adding an id that is already present
//! leaves the array untouched.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Collection, Customer, Order, OrderStatus, Product};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    // Products

    async fn insert_product(&self, product: &Product) -> StoreResult<()>;
    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>>;
    /// All products, newest first.
    async fn list_products(&self) -> StoreResult<Vec<Product>>;
    async fn get_products(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>>;
    /// Reverse lookup: products whose `collections` contain `collection_id`.
    async fn find_products_in_collection(&self, collection_id: Uuid) -> StoreResult<Vec<Product>>;
    /// Overwrites the stored product. Returns `false` when no such product exists.
    async fn replace_product(&self, product: &Product) -> StoreResult<bool>;
    async fn delete_product(&self, id: Uuid) -> StoreResult<bool>;
    /// Removes `collection_id` from one product's `collections`.
    async fn remove_collection_from_product(&self, product_id: Uuid, collection_id: Uuid) -> StoreResult<bool>;

    // Collections

    async fn insert_collection(&self, collection: &Collection) -> StoreResult<()>;
    async fn get_collection(&self, id: Uuid) -> StoreResult<Option<Collection>>;
    async fn find_collection_by_title(&self, title: &str) -> StoreResult<Option<Collection>>;
    /// All collections, newest first.
    async fn list_collections(&self) -> StoreResult<Vec<Collection>>;
    async fn get_collections(&self, ids: &[Uuid]) -> StoreResult<Vec<Collection>>;
    async fn replace_collection(&self, collection: &Collection) -> StoreResult<bool>;
    async fn delete_collection(&self, id: Uuid) -> StoreResult<bool>;
    /// Adds `product_id` to a collection's `products` unless already present.
    /// Returns `false` when the collection does not exist.
    async fn add_product_to_collection(&self, collection_id: Uuid, product_id: Uuid) -> StoreResult<bool>;
    /// Returns `false` when the collection does not exist.
    async fn remove_product_from_collection(&self, collection_id: Uuid, product_id: Uuid) -> StoreResult<bool>;

    // Orders and customers

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>>;
    /// All orders, newest first.
    async fn list_orders(&self) -> StoreResult<Vec<Order>>;
    async fn set_order_status(&self, id: Uuid, status: OrderStatus, updated_at: DateTime<Utc>) -> StoreResult<bool>;
    async fn list_customers(&self) -> StoreResult<Vec<Customer>>;
    async fn get_customer(&self, id: Uuid) -> StoreResult<Option<Customer>>;

    async fn health_check(&self) -> StoreResult<()>;
}
