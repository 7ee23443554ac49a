//! Catalog service: the operations the back office UI calls.
//!
//! Every mutating operation takes the caller resolved by the identity provider
//! and fails with [`CatalogError::Unauthenticated`] without one. Validation
//! happens before the first write; after that, multi-document work is applied
//! best-effort through [`RelationshipSync`].

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::analytics::{self, DashboardMetrics};
use crate::domain::aggregates::{
    dedup_ids, Collection, CollectionInput, CollectionView, Customer, Order, OrderDetail, OrderStatus,
    OrderSummary, Product, ProductInput, ProductView,
};
use crate::domain::events::{CollectionEvent, DomainEvent, EventPublisher, ProductEvent};
use crate::domain::value_objects::CallerId;
use crate::store::CatalogStore;
use crate::sync::{RelationshipSync, SyncFailure};
use crate::{CatalogError, Result};

fn require_caller(caller: Option<&CallerId>) -> Result<&CallerId> {
    caller.ok_or(CatalogError::Unauthenticated)
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
    events: EventPublisher,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>, events: EventPublisher) -> Self { Self { store, events } }

    pub fn store(&self) -> &dyn CatalogStore { self.store.as_ref() }

    fn sync(&self) -> RelationshipSync<'_> { RelationshipSync::new(self.store.as_ref()) }

    // =========================================================================
    // Products
    // =========================================================================

    pub async fn list_products(&self) -> Result<Vec<ProductView>> {
        let products = self.store.list_products().await?;
        let referenced: Vec<Uuid> = dedup_ids(&products.iter().flat_map(|p| p.collections.iter().copied()).collect::<Vec<_>>());
        let collections = self.store.get_collections(&referenced).await?;
        Ok(products.into_iter().map(|p| p.populate(&collections)).collect())
    }

    pub async fn get_product(&self, id: Uuid) -> Result<ProductView> {
        let product = self.store.get_product(id).await?.ok_or(CatalogError::NotFound("Product"))?;
        let collections = self.store.get_collections(&product.collections).await?;
        Ok(product.populate(&collections))
    }

    #[tracing::instrument(skip(self, input, caller))]
    pub async fn create_product(&self, input: ProductInput, caller: Option<&CallerId>) -> Result<Product> {
        let caller = require_caller(caller)?;
        let mut product = Product::create(input.into_fields()?);
        self.store.insert_product(&product).await?;

        let outcome = match self.sync().on_product_created(product.id, &product.collections).await {
            Ok(outcome) => outcome,
            Err(failure) => return Err(self.keep_partial_links(&mut product, failure, &[]).await),
        };
        if !outcome.missing.is_empty() {
            product.forget_collections(&outcome.missing);
            self.store.replace_product(&product).await?;
        }

        tracing::info!(product_id = %product.id, %caller, collections = product.collections.len(), "product created");
        self.events.publish(DomainEvent::Product(ProductEvent::Created { product_id: product.id, collections: product.collections.clone() })).await;
        Ok(product)
    }

    #[tracing::instrument(skip(self, input, caller))]
    pub async fn update_product(&self, id: Uuid, input: ProductInput, caller: Option<&CallerId>) -> Result<ProductView> {
        let caller = require_caller(caller)?;
        let mut product = self.store.get_product(id).await?.ok_or(CatalogError::NotFound("Product"))?;
        let fields = input.into_fields()?;

        let previous = product.collections.clone();
        let outcome = match self.sync().apply_product_collection_diff(id, &previous, &fields.collections).await {
            Ok(outcome) => outcome,
            Err(failure) => return Err(self.keep_partial_links(&mut product, failure, &previous).await),
        };
        product.overwrite(fields);
        product.forget_collections(&outcome.missing);

        if !self.store.replace_product(&product).await? {
            // Deleted while we were linking it; undo the links we just made.
            self.sync().on_product_deleted(id, &product.collections).await;
            return Err(CatalogError::NotFound("Product"));
        }

        tracing::info!(product_id = %id, %caller, added = outcome.diff.added.len(), removed = outcome.diff.removed.len(), "product updated");
        self.events.publish(DomainEvent::Product(ProductEvent::Updated { product_id: id, added: outcome.diff.added, removed: outcome.diff.removed })).await;

        let collections = self.store.get_collections(&product.collections).await?;
        Ok(product.populate(&collections))
    }

    /// Stores the membership that actually landed so a retried diff starts
    /// from it and converges. Other product fields are left as they were.
    async fn keep_partial_links(&self, product: &mut Product, failure: SyncFailure, previous: &[Uuid]) -> CatalogError {
        product.collections = failure.linked(previous);
        if let Err(e) = self.store.replace_product(product).await {
            tracing::error!(product_id = %product.id, error = %e, "could not record partially applied collection links");
        }
        failure.error.into()
    }

    #[tracing::instrument(skip(self, caller))]
    pub async fn delete_product(&self, id: Uuid, caller: Option<&CallerId>) -> Result<()> {
        let caller = require_caller(caller)?;
        let product = self.store.get_product(id).await?.ok_or(CatalogError::NotFound("Product"))?;
        self.store.delete_product(id).await?;

        let failed = self.sync().on_product_deleted(id, &product.collections).await;
        tracing::info!(product_id = %id, %caller, cleanup_failures = failed, "product deleted");
        self.events.publish(DomainEvent::Product(ProductEvent::Deleted { product_id: id })).await;
        Ok(())
    }

    // =========================================================================
    // Collections
    // =========================================================================

    pub async fn list_collections(&self) -> Result<Vec<Collection>> {
        Ok(self.store.list_collections().await?)
    }

    pub async fn get_collection(&self, id: Uuid) -> Result<CollectionView> {
        let collection = self.store.get_collection(id).await?.ok_or(CatalogError::NotFound("Collection"))?;
        let products = self.store.get_products(&collection.products).await?;
        Ok(collection.populate(&products))
    }

    #[tracing::instrument(skip(self, input, caller))]
    pub async fn create_collection(&self, input: CollectionInput, caller: Option<&CallerId>) -> Result<Collection> {
        let caller = require_caller(caller)?;
        let fields = input.into_fields()?;
        if self.store.find_collection_by_title(&fields.title).await?.is_some() {
            return Err(CatalogError::Conflict("Collection already exists".into()));
        }
        let collection = Collection::create(fields);
        self.store.insert_collection(&collection).await?;

        tracing::info!(collection_id = %collection.id, %caller, title = %collection.title, "collection created");
        self.events.publish(DomainEvent::Collection(CollectionEvent::Created { collection_id: collection.id, title: collection.title.clone() })).await;
        Ok(collection)
    }

    #[tracing::instrument(skip(self, input, caller))]
    pub async fn update_collection(&self, id: Uuid, input: CollectionInput, caller: Option<&CallerId>) -> Result<Collection> {
        let caller = require_caller(caller)?;
        let mut collection = self.store.get_collection(id).await?.ok_or(CatalogError::NotFound("Collection"))?;
        let fields = input.into_fields()?;
        if let Some(other) = self.store.find_collection_by_title(&fields.title).await? {
            if other.id != id { return Err(CatalogError::Conflict("Collection already exists".into())); }
        }

        collection.overwrite(fields);
        if !self.store.replace_collection(&collection).await? {
            return Err(CatalogError::NotFound("Collection"));
        }

        tracing::info!(collection_id = %id, %caller, "collection updated");
        self.events.publish(DomainEvent::Collection(CollectionEvent::Updated { collection_id: id })).await;
        Ok(collection)
    }

    /// Deleting an already-missing collection still sweeps dangling product
    /// references, so a retried delete finishes an interrupted cleanup.
    #[tracing::instrument(skip(self, caller))]
    pub async fn delete_collection(&self, id: Uuid, caller: Option<&CallerId>) -> Result<usize> {
        let caller = require_caller(caller)?;
        if !self.store.delete_collection(id).await? {
            tracing::debug!(collection_id = %id, "collection already gone; sweeping references");
        }
        let detached = self.sync().on_collection_deleted(id).await;

        tracing::info!(collection_id = %id, %caller, detached, "collection deleted");
        self.events.publish(DomainEvent::Collection(CollectionEvent::Deleted { collection_id: id, detached_products: detached })).await;
        Ok(detached)
    }

    // =========================================================================
    // Orders and customers
    // =========================================================================

    /// Validates against the status persisted right now, then writes. Two
    /// concurrent requests can still both pass validation; there is no
    /// version check on the write.
    #[tracing::instrument(skip(self, caller))]
    pub async fn transition_order_status(&self, id: Uuid, requested: &str, caller: Option<&CallerId>) -> Result<Order> {
        let caller = require_caller(caller)?;
        let mut order = self.store.get_order(id).await?.ok_or(CatalogError::NotFound("Order"))?;
        let requested: OrderStatus = requested.parse()?;
        order.transition_to(requested)?;

        if !self.store.set_order_status(id, order.status(), order.updated_at).await? {
            return Err(CatalogError::NotFound("Order"));
        }

        tracing::info!(order_id = %id, %caller, status = %requested, "order status updated");
        self.events.publish_all(order.take_events()).await;
        Ok(order)
    }

    pub async fn list_orders(&self, caller: Option<&CallerId>) -> Result<Vec<OrderSummary>> {
        require_caller(caller)?;
        let (orders, customers) = tokio::try_join!(self.store.list_orders(), self.store.list_customers())?;
        let names: HashMap<Uuid, &str> = customers.iter().map(|c| (c.id, c.name.as_str())).collect();
        Ok(orders.iter().map(|o| o.summarize(names.get(&o.customer).copied())).collect())
    }

    pub async fn get_order(&self, id: Uuid, caller: Option<&CallerId>) -> Result<OrderDetail> {
        require_caller(caller)?;
        let order = self.store.get_order(id).await?.ok_or(CatalogError::NotFound("Order"))?;
        let customer = self.store.get_customer(order.customer).await?;
        Ok(OrderDetail { order, customer })
    }

    pub async fn list_customers(&self, caller: Option<&CallerId>) -> Result<Vec<Customer>> {
        require_caller(caller)?;
        Ok(self.store.list_customers().await?)
    }

    // =========================================================================
    // Dashboard
    // =========================================================================

    pub async fn dashboard_metrics(&self) -> Result<DashboardMetrics> {
        let (orders, customers) = tokio::try_join!(self.store.list_orders(), self.store.list_customers())?;
        Ok(analytics::dashboard(&orders, &customers, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::collection::sample_collection_input;
    use crate::domain::aggregates::order::sample_order;
    use crate::domain::aggregates::product::sample_input;
    use crate::store::MemoryStore;
    use rust_decimal::Decimal;

    fn service() -> (CatalogService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (CatalogService::new(store.clone(), EventPublisher::disabled()), store)
    }

    fn admin() -> CallerId { CallerId::new("admin-1").unwrap() }

    async fn collection(svc: &CatalogService, title: &str) -> Uuid {
        svc.create_collection(sample_collection_input(title), Some(&admin())).await.unwrap().id
    }

    /// `P.collections ∋ C` iff `C.products ∋ P`, over the whole store.
    async fn assert_symmetric(store: &MemoryStore) {
        let products = store.list_products().await.unwrap();
        let collections = store.list_collections().await.unwrap();
        for p in &products {
            for c in &collections {
                assert_eq!(p.collections.contains(&c.id), c.products.contains(&p.id), "product {} / collection {}", p.title, c.title);
            }
        }
        for p in &products {
            for id in &p.collections {
                assert!(collections.iter().any(|c| c.id == *id), "dangling collection id on {}", p.title);
            }
        }
        for c in &collections {
            for id in &c.products {
                assert!(products.iter().any(|p| p.id == *id), "dangling product id on {}", c.title);
            }
        }
    }

    #[tokio::test]
    async fn test_mutations_require_caller() {
        let (svc, _) = service();
        assert!(matches!(svc.create_collection(sample_collection_input("A"), None).await, Err(CatalogError::Unauthenticated)));
        assert!(matches!(svc.create_product(sample_input("Tee", vec![]), None).await, Err(CatalogError::Unauthenticated)));
        assert!(matches!(svc.delete_collection(Uuid::new_v4(), None).await, Err(CatalogError::Unauthenticated)));
        assert!(matches!(svc.transition_order_status(Uuid::new_v4(), "Shipped", None).await, Err(CatalogError::Unauthenticated)));
        assert!(matches!(svc.list_orders(None).await, Err(CatalogError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_duplicate_collection_title_conflicts() {
        let (svc, _) = service();
        collection(&svc, "Summer").await;
        let mut other = sample_collection_input("Summer");
        other.description = Some("something else".into());
        other.image = Some("https://cdn.example.com/other.png".into());
        assert!(matches!(svc.create_collection(other, Some(&admin())).await, Err(CatalogError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_collection() {
        let (svc, _) = service();
        let id = collection(&svc, "Summer").await;
        collection(&svc, "Winter").await;
        assert!(matches!(svc.update_collection(Uuid::new_v4(), sample_collection_input("X"), Some(&admin())).await, Err(CatalogError::NotFound(_))));
        assert!(matches!(svc.update_collection(id, sample_collection_input("Winter"), Some(&admin())).await, Err(CatalogError::Conflict(_))));
        let updated = svc.update_collection(id, sample_collection_input("Summer 2025"), Some(&admin())).await.unwrap();
        assert_eq!(updated.title, "Summer 2025");
        assert_eq!(svc.get_collection(id).await.unwrap().title, "Summer 2025");
    }

    #[tokio::test]
    async fn test_product_lifecycle_keeps_links_symmetric() {
        let (svc, store) = service();
        let (a, b, c) = (collection(&svc, "A").await, collection(&svc, "B").await, collection(&svc, "C").await);

        let tee = svc.create_product(sample_input("Tee", vec![a, b, a]), Some(&admin())).await.unwrap();
        assert_eq!(tee.collections, vec![a, b]);
        let cap = svc.create_product(sample_input("Cap", vec![b]), Some(&admin())).await.unwrap();
        assert_symmetric(&store).await;

        let view = svc.update_product(tee.id, sample_input("Tee v2", vec![c, b]), Some(&admin())).await.unwrap();
        assert_eq!(view.title, "Tee v2");
        let titles: Vec<&str> = view.collections.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "B"]);
        assert_symmetric(&store).await;

        svc.delete_collection(b, Some(&admin())).await.unwrap();
        assert_symmetric(&store).await;

        svc.delete_product(cap.id, Some(&admin())).await.unwrap();
        svc.delete_product(tee.id, Some(&admin())).await.unwrap();
        assert_symmetric(&store).await;
        assert!(store.get_collection(c).await.unwrap().unwrap().products.is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_collection_ids_are_dropped() {
        let (svc, store) = service();
        let a = collection(&svc, "A").await;
        let ghost = Uuid::new_v4();
        let p = svc.create_product(sample_input("Tee", vec![ghost, a]), Some(&admin())).await.unwrap();
        assert_eq!(p.collections, vec![a]);
        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().collections, vec![a]);
        assert_symmetric(&store).await;
    }

    #[tokio::test]
    async fn test_update_product_failures() {
        let (svc, _) = service();
        assert!(matches!(svc.update_product(Uuid::new_v4(), sample_input("Tee", vec![]), Some(&admin())).await, Err(CatalogError::NotFound(_))));
        let p = svc.create_product(sample_input("Tee", vec![]), Some(&admin())).await.unwrap();
        let mut bad = sample_input("Tee", vec![]);
        bad.description = None;
        assert!(matches!(svc.update_product(p.id, bad, Some(&admin())).await, Err(CatalogError::InvalidInput(_))));
        assert!(matches!(svc.delete_product(Uuid::new_v4(), Some(&admin())).await, Err(CatalogError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_partial_update_failure_surfaces_and_retry_converges() {
        let (svc, store) = service();
        let (a, b, c) = (collection(&svc, "A").await, collection(&svc, "B").await, collection(&svc, "C").await);
        let p = svc.create_product(sample_input("Tee", vec![c]), Some(&admin())).await.unwrap();

        store.fail_writes_to(b);
        let err = svc.update_product(p.id, sample_input("Tee", vec![a, b]), Some(&admin())).await.unwrap_err();
        assert!(matches!(err, CatalogError::StoreUnavailable(_)));
        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().collections, vec![a]);
        assert_symmetric(&store).await;

        store.restore_writes_to(b);
        svc.update_product(p.id, sample_input("Tee", vec![a, b]), Some(&admin())).await.unwrap();
        assert_eq!(store.get_collection(b).await.unwrap().unwrap().products, vec![p.id]);
        assert_symmetric(&store).await;
    }

    #[tokio::test]
    async fn test_partial_create_failure_retry_converges() {
        let (svc, store) = service();
        let (a, b) = (collection(&svc, "A").await, collection(&svc, "B").await);

        store.fail_writes_to(b);
        let err = svc.create_product(sample_input("Tee", vec![a, b]), Some(&admin())).await.unwrap_err();
        assert!(matches!(err, CatalogError::StoreUnavailable(_)));
        let stored = store.list_products().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].collections, vec![a]);
        assert_symmetric(&store).await;

        store.restore_writes_to(b);
        svc.update_product(stored[0].id, sample_input("Tee", vec![a, b]), Some(&admin())).await.unwrap();
        assert_eq!(store.get_collection(b).await.unwrap().unwrap().products, vec![stored[0].id]);
        assert_symmetric(&store).await;
    }

    #[tokio::test]
    async fn test_update_racing_delete_unlinks_new_collections() {
        let (svc, store) = service();
        let (a, b) = (collection(&svc, "A").await, collection(&svc, "B").await);
        let p = svc.create_product(sample_input("Tee", vec![a]), Some(&admin())).await.unwrap();

        store.delete_before_next_write(p.id);
        let err = svc.update_product(p.id, sample_input("Tee", vec![a, b]), Some(&admin())).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound("Product")));
        assert!(store.get_product(p.id).await.unwrap().is_none());
        assert!(store.get_collection(b).await.unwrap().unwrap().products.is_empty());
        assert!(store.get_collection(a).await.unwrap().unwrap().products.is_empty());
        assert_symmetric(&store).await;
    }

    #[tokio::test]
    async fn test_collection_delete_detaches_three_products() {
        let (svc, store) = service();
        let a = collection(&svc, "A").await;
        let mut ids = vec![];
        for title in ["one", "two", "three"] {
            ids.push(svc.create_product(sample_input(title, vec![a]), Some(&admin())).await.unwrap().id);
        }
        assert_eq!(svc.delete_collection(a, Some(&admin())).await.unwrap(), 3);
        for id in ids {
            assert!(store.get_product(id).await.unwrap().unwrap().collections.is_empty());
        }
        assert!(matches!(svc.get_collection(a).await, Err(CatalogError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_order_transitions() {
        let (svc, store) = service();
        let order = sample_order(Uuid::new_v4(), Decimal::new(99, 0), Utc::now());
        let id = order.id;
        store.insert_order(order).await;

        assert!(matches!(svc.transition_order_status(Uuid::new_v4(), "Shipped", Some(&admin())).await, Err(CatalogError::NotFound(_))));
        assert!(matches!(svc.transition_order_status(id, "Lost", Some(&admin())).await, Err(CatalogError::InvalidInput(_))));
        assert!(matches!(
            svc.transition_order_status(id, "Delivered", Some(&admin())).await,
            Err(CatalogError::InvalidTransition { current: OrderStatus::Processing, requested: OrderStatus::Delivered })
        ));

        assert_eq!(svc.transition_order_status(id, "Shipped", Some(&admin())).await.unwrap().status(), OrderStatus::Shipped);
        assert_eq!(svc.transition_order_status(id, "Delivered", Some(&admin())).await.unwrap().status(), OrderStatus::Delivered);
        assert_eq!(store.get_order(id).await.unwrap().unwrap().status(), OrderStatus::Delivered);

        for next in ["Processing", "Shipped", "Delivered", "Cancelled"] {
            assert!(matches!(svc.transition_order_status(id, next, Some(&admin())).await, Err(CatalogError::InvalidTransition { .. })));
        }
    }

    #[tokio::test]
    async fn test_order_reads() {
        let (svc, store) = service();
        let customer = Customer::new("uid-9", "Ngozi", "ngozi@example.com");
        let order = sample_order(customer.id, Decimal::new(40, 0), Utc::now());
        let order_id = order.id;
        store.insert_customer(customer).await;
        store.insert_order(order).await;

        let rows = svc.list_orders(Some(&admin())).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].customer, "Ngozi");
        assert_eq!(rows[0].products, 1);
        let detail = svc.get_order(order_id, Some(&admin())).await.unwrap();
        assert_eq!(detail.customer.map(|c| c.name), Some("Ngozi".to_string()));
        assert_eq!(svc.list_customers(Some(&admin())).await.unwrap().len(), 1);

        let metrics = svc.dashboard_metrics().await.unwrap();
        assert_eq!(metrics.total_sales.total_orders, 1);
        assert_eq!(metrics.total_customers.total_customers, 1);
        assert_eq!(metrics.sales_per_month.len(), 12);
    }
}
