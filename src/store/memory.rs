//! In-process store used for local development (`STORE_BACKEND=memory`) and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CatalogStore, StoreError, StoreResult};
use crate::domain::aggregates::{Collection, Customer, Order, OrderStatus, Product};

#[derive(Debug, Default)]
struct Documents {
    products: HashMap<Uuid, Product>,
    collections: HashMap<Uuid, Collection>,
    orders: HashMap<Uuid, Order>,
    customers: HashMap<Uuid, Customer>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<Documents>,
    unavailable: std::sync::Mutex<HashSet<Uuid>>,
    vanishing: std::sync::Mutex<HashSet<Uuid>>,
}

fn newest_first<T: Clone>(items: impl Iterator<Item = T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut out: Vec<T> = items.collect();
    out.sort_by_key(|b| std::cmp::Reverse(created_at(b)));
    out
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Orders come from checkout; this seeds them.
    pub async fn insert_order(&self, order: Order) { self.docs.write().await.orders.insert(order.id, order); }

    pub async fn insert_customer(&self, customer: Customer) { self.docs.write().await.customers.insert(customer.id, customer); }

    /// Makes every later write that targets document `id` fail, simulating an outage.
    pub fn fail_writes_to(&self, id: Uuid) {
        if let Ok(mut ids) = self.unavailable.lock() { ids.insert(id); }
    }

    /// Ends a simulated outage started by [`MemoryStore::fail_writes_to`].
    pub fn restore_writes_to(&self, id: Uuid) {
        if let Ok(mut ids) = self.unavailable.lock() { ids.remove(&id); }
    }

    /// Deletes product `id` just before the next write that targets it, as if
    /// a concurrent request had removed it between read and write.
    pub fn delete_before_next_write(&self, id: Uuid) {
        if let Ok(mut ids) = self.vanishing.lock() { ids.insert(id); }
    }

    fn take_vanishing(&self, docs: &mut Documents, id: Uuid) {
        let hit = self.vanishing.lock().map(|mut ids| ids.remove(&id)).unwrap_or(false);
        if hit { docs.products.remove(&id); }
    }

    fn check_writable(&self, id: Uuid) -> StoreResult<()> {
        let blocked = self.unavailable.lock().map(|ids| ids.contains(&id)).unwrap_or(false);
        if blocked { return Err(StoreError::Unavailable(format!("write to {id} refused"))); }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        self.check_writable(product.id)?;
        self.docs.write().await.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.docs.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        Ok(newest_first(self.docs.read().await.products.values().cloned(), |p| p.created_at))
    }

    async fn get_products(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        let docs = self.docs.read().await;
        Ok(ids.iter().filter_map(|id| docs.products.get(id).cloned()).collect())
    }

    async fn find_products_in_collection(&self, collection_id: Uuid) -> StoreResult<Vec<Product>> {
        let docs = self.docs.read().await;
        Ok(newest_first(docs.products.values().filter(|p| p.collections.contains(&collection_id)).cloned(), |p| p.created_at))
    }

    async fn replace_product(&self, product: &Product) -> StoreResult<bool> {
        self.check_writable(product.id)?;
        let mut docs = self.docs.write().await;
        self.take_vanishing(&mut docs, product.id);
        match docs.products.get_mut(&product.id) {
            Some(existing) => { *existing = product.clone(); Ok(true) }
            None => Ok(false),
        }
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
        self.check_writable(id)?;
        Ok(self.docs.write().await.products.remove(&id).is_some())
    }

    async fn remove_collection_from_product(&self, product_id: Uuid, collection_id: Uuid) -> StoreResult<bool> {
        self.check_writable(product_id)?;
        let mut docs = self.docs.write().await;
        self.take_vanishing(&mut docs, product_id);
        let Some(product) = docs.products.get_mut(&product_id) else { return Ok(false) };
        product.collections.retain(|c| *c != collection_id);
        Ok(true)
    }

    async fn insert_collection(&self, collection: &Collection) -> StoreResult<()> {
        self.check_writable(collection.id)?;
        let mut docs = self.docs.write().await;
        if docs.collections.values().any(|c| c.title == collection.title) {
            return Err(StoreError::Conflict(format!("collection title {:?}", collection.title)));
        }
        docs.collections.insert(collection.id, collection.clone());
        Ok(())
    }

    async fn get_collection(&self, id: Uuid) -> StoreResult<Option<Collection>> {
        Ok(self.docs.read().await.collections.get(&id).cloned())
    }

    async fn find_collection_by_title(&self, title: &str) -> StoreResult<Option<Collection>> {
        Ok(self.docs.read().await.collections.values().find(|c| c.title == title).cloned())
    }

    async fn list_collections(&self) -> StoreResult<Vec<Collection>> {
        Ok(newest_first(self.docs.read().await.collections.values().cloned(), |c| c.created_at))
    }

    async fn get_collections(&self, ids: &[Uuid]) -> StoreResult<Vec<Collection>> {
        let docs = self.docs.read().await;
        Ok(ids.iter().filter_map(|id| docs.collections.get(id).cloned()).collect())
    }

    async fn replace_collection(&self, collection: &Collection) -> StoreResult<bool> {
        self.check_writable(collection.id)?;
        let mut docs = self.docs.write().await;
        if docs.collections.values().any(|c| c.id != collection.id && c.title == collection.title) {
            return Err(StoreError::Conflict(format!("collection title {:?}", collection.title)));
        }
        match docs.collections.get_mut(&collection.id) {
            Some(existing) => {
                // Membership is owned by the add/remove operations.
                existing.title = collection.title.clone();
                existing.description = collection.description.clone();
                existing.image = collection.image.clone();
                existing.updated_at = collection.updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_collection(&self, id: Uuid) -> StoreResult<bool> {
        self.check_writable(id)?;
        Ok(self.docs.write().await.collections.remove(&id).is_some())
    }

    async fn add_product_to_collection(&self, collection_id: Uuid, product_id: Uuid) -> StoreResult<bool> {
        self.check_writable(collection_id)?;
        let mut docs = self.docs.write().await;
        let Some(collection) = docs.collections.get_mut(&collection_id) else { return Ok(false) };
        if !collection.products.contains(&product_id) { collection.products.push(product_id); }
        Ok(true)
    }

    async fn remove_product_from_collection(&self, collection_id: Uuid, product_id: Uuid) -> StoreResult<bool> {
        self.check_writable(collection_id)?;
        let mut docs = self.docs.write().await;
        let Some(collection) = docs.collections.get_mut(&collection_id) else { return Ok(false) };
        collection.products.retain(|p| *p != product_id);
        Ok(true)
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.docs.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self) -> StoreResult<Vec<Order>> {
        Ok(newest_first(self.docs.read().await.orders.values().cloned(), |o| o.created_at))
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus, updated_at: DateTime<Utc>) -> StoreResult<bool> {
        self.check_writable(id)?;
        let mut docs = self.docs.write().await;
        let Some(order) = docs.orders.get_mut(&id) else { return Ok(false) };
        order.status = status;
        order.updated_at = updated_at;
        Ok(true)
    }

    async fn list_customers(&self) -> StoreResult<Vec<Customer>> {
        Ok(newest_first(self.docs.read().await.customers.values().cloned(), |c| c.created_at))
    }

    async fn get_customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        Ok(self.docs.read().await.customers.get(&id).cloned())
    }

    async fn health_check(&self) -> StoreResult<()> { Ok(()) }
}
