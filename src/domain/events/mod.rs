//! Domain events
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::OrderStatus;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "entity", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Collection(CollectionEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: Uuid, collections: Vec<Uuid> },
    Updated { product_id: Uuid, added: Vec<Uuid>, removed: Vec<Uuid> },
    Deleted { product_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CollectionEvent {
    Created { collection_id: Uuid, title: String },
    Updated { collection_id: Uuid },
    Deleted { collection_id: Uuid, detached_products: usize },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OrderEvent {
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
}

impl DomainEvent {
    /// NATS subject, `backoffice.<entity>.<action>`.
    pub fn subject(&self) -> String {
        let (entity, action) = match self {
            Self::Product(ProductEvent::Created { .. }) => ("product", "created"),
            Self::Product(ProductEvent::Updated { .. }) => ("product", "updated"),
            Self::Product(ProductEvent::Deleted { .. }) => ("product", "deleted"),
            Self::Collection(CollectionEvent::Created { .. }) => ("collection", "created"),
            Self::Collection(CollectionEvent::Updated { .. }) => ("collection", "updated"),
            Self::Collection(CollectionEvent::Deleted { .. }) => ("collection", "deleted"),
            Self::Order(OrderEvent::StatusChanged { .. }) => ("order", "status_changed"),
        };
        format!("backoffice.{entity}.{action}")
    }
}

/// Fire-and-forget publisher; disabled when no NATS connection is configured.
#[derive(Clone, Debug, Default)]
pub struct EventPublisher { nats: Option<async_nats::Client> }

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }
    pub fn disabled() -> Self { Self::default() }
    pub fn is_enabled(&self) -> bool { self.nats.is_some() }

    pub async fn publish(&self, event: DomainEvent) {
        let Some(client) = &self.nats else { return };
        let subject = event.subject();
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => { tracing::warn!(%subject, error = %e, "failed to encode domain event"); return; }
        };
        if let Err(e) = client.publish(subject.clone(), payload.into()).await {
            tracing::warn!(%subject, error = %e, "failed to publish domain event");
        }
    }

    pub async fn publish_all(&self, events: Vec<DomainEvent>) {
        for event in events { self.publish(event).await; }
    }
}
