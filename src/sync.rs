//! Relationship synchronizer: keeps `Product::collections` and
//! `Collection::products` mirror images of each other.
//!
//! The store offers no multi-document transaction, so membership changes are
//! computed as a set difference and applied as independent single-document
//! updates. Each update is idempotent (add-to-set / remove), which makes the
//! whole diff safe to re-run: a retry after a partial failure converges on the
//! desired state instead of duplicating ids.

use futures::future::join_all;
use std::collections::HashSet;
use uuid::Uuid;

use crate::domain::aggregates::dedup_ids;
use crate::store::{CatalogStore, StoreError};

/// Membership change between two collection-id lists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectionDiff {
    /// `desired − previous`
    pub added: Vec<Uuid>,
    /// `previous − desired`
    pub removed: Vec<Uuid>,
}

impl CollectionDiff {
    pub fn between(previous: &[Uuid], desired: &[Uuid]) -> Self {
        let previous = dedup_ids(previous);
        let desired = dedup_ids(desired);
        let before: HashSet<Uuid> = previous.iter().copied().collect();
        let after: HashSet<Uuid> = desired.iter().copied().collect();
        Self {
            added: desired.into_iter().filter(|id| !before.contains(id)).collect(),
            removed: previous.into_iter().filter(|id| !after.contains(id)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool { self.added.is_empty() && self.removed.is_empty() }
}

/// What a diff application actually did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub diff: CollectionDiff,
    /// Ids in `diff.added` with no collection behind them.
    pub missing: Vec<Uuid>,
}

/// A diff that stopped part-way. `applied` holds the updates that landed
/// before or alongside the failure; none of them are rolled back.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct SyncFailure {
    pub error: StoreError,
    pub applied: CollectionDiff,
}

impl SyncFailure {
    /// Membership the product actually has after the partial apply.
    pub fn linked(&self, previous: &[Uuid]) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = dedup_ids(previous).into_iter().filter(|id| !self.applied.removed.contains(id)).collect();
        for id in &self.applied.added {
            if !ids.contains(id) { ids.push(*id); }
        }
        ids
    }
}

pub struct RelationshipSync<'a> { store: &'a dyn CatalogStore }

enum Change { Add(Uuid), Remove(Uuid) }

impl<'a> RelationshipSync<'a> {
    pub fn new(store: &'a dyn CatalogStore) -> Self { Self { store } }

    /// Pushes `product_id` into every added collection and pulls it from every
    /// removed one. All updates are attempted even if some fail; nothing is
    /// rolled back; the first failure is returned with the updates that did land.
    pub async fn apply_product_collection_diff(&self, product_id: Uuid, previous: &[Uuid], desired: &[Uuid]) -> Result<SyncOutcome, SyncFailure> {
        let diff = CollectionDiff::between(previous, desired);
        if diff.is_empty() { return Ok(SyncOutcome { diff, missing: vec![] }); }

        let changes = diff.added.iter().map(|id| Change::Add(*id)).chain(diff.removed.iter().map(|id| Change::Remove(*id)));
        let results = join_all(changes.map(|change| async move {
            let result = match change {
                Change::Add(id) => self.store.add_product_to_collection(id, product_id).await,
                Change::Remove(id) => self.store.remove_product_from_collection(id, product_id).await,
            };
            (change, result)
        })).await;

        let mut missing = Vec::new();
        let mut applied = CollectionDiff::default();
        let mut first_error: Option<StoreError> = None;
        for (change, result) in results {
            match (change, result) {
                (Change::Add(id), Ok(false)) => missing.push(id),
                (Change::Add(id), Ok(true)) => applied.added.push(id),
                (Change::Remove(id), Ok(_)) => applied.removed.push(id),
                (Change::Add(id) | Change::Remove(id), Err(e)) => {
                    tracing::error!(%product_id, collection_id = %id, error = %e, "collection membership update failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(error) = first_error { return Err(SyncFailure { error, applied }); }
        if !missing.is_empty() {
            tracing::warn!(%product_id, missing = ?missing, "ignoring unresolved collection ids");
        }
        Ok(SyncOutcome { diff, missing })
    }

    pub async fn on_product_created(&self, product_id: Uuid, collection_ids: &[Uuid]) -> Result<SyncOutcome, SyncFailure> {
        self.apply_product_collection_diff(product_id, &[], collection_ids).await
    }

    /// Best-effort: failures are logged and counted, never returned.
    pub async fn on_product_deleted(&self, product_id: Uuid, collection_ids: &[Uuid]) -> usize {
        let ids = dedup_ids(collection_ids);
        let results = join_all(ids.iter().map(|id| self.store.remove_product_from_collection(*id, product_id))).await;
        let mut failed = 0;
        for (id, result) in ids.iter().zip(results) {
            if let Err(e) = result {
                failed += 1;
                tracing::warn!(%product_id, collection_id = %id, error = %e, "cleanup after product delete failed");
            }
        }
        failed
    }

    /// Best-effort reverse cleanup: detaches `collection_id` from every product
    /// that still references it. Returns how many products were detached.
    pub async fn on_collection_deleted(&self, collection_id: Uuid) -> usize {
        let referencing = match self.store.find_products_in_collection(collection_id).await {
            Ok(products) => products,
            Err(e) => {
                tracing::warn!(%collection_id, error = %e, "reverse lookup after collection delete failed");
                return 0;
            }
        };
        let results = join_all(referencing.iter().map(|p| self.store.remove_collection_from_product(p.id, collection_id))).await;
        let mut detached = 0;
        for (product, result) in referencing.iter().zip(results) {
            match result {
                Ok(true) => detached += 1,
                Ok(false) => tracing::debug!(%collection_id, product_id = %product.id, "product already gone"),
                Err(e) => tracing::warn!(%collection_id, product_id = %product.id, error = %e, "cleanup after collection delete failed"),
            }
        }
        detached
    }
}
