//! Order Aggregate
//!
//! Orders are created by the checkout flow upstream. This layer only moves
//! their fulfillment status forward:
//!
//! ```text
//! Processing ──► Shipped ──► Delivered
//!      │            │
//!      └────────────┴──────► Cancelled
//! ```
//!
//! `Delivered` and `Cancelled` are terminal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use super::customer::Customer;
use crate::domain::events::{DomainEvent, OrderEvent};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub customer: Uuid,
    pub products: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub shipping_address: ShippingAddress,
    pub shipping_rate: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem { pub product: Uuid, pub color: String, pub size: String, pub quantity: u32 }

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress { pub street: String, pub city: String, pub state: String, pub postal_code: String, pub country: String }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus { #[default] Processing, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [Self::Processing, Self::Shipped, Self::Delivered, Self::Cancelled];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Processing, Self::Shipped | Self::Cancelled) | (Self::Shipped, Self::Delivered | Self::Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str() == s).ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

/// Row shown in the orders table.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: Uuid,
    pub customer: String,
    pub products: usize,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail { pub order: Order, pub customer: Option<Customer> }

impl Order {
    pub fn create(customer: Uuid, products: Vec<OrderItem>, total_amount: Decimal, shipping_address: ShippingAddress, shipping_rate: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), customer, products, total_amount, shipping_address, shipping_rate: shipping_rate.into(),
            status: OrderStatus::Processing, created_at: now, updated_at: now, events: vec![],
        }
    }

    pub fn status(&self) -> OrderStatus { self.status }

    /// Applies one step of the state machine against the status this value was loaded with.
    pub fn transition_to(&mut self, requested: OrderStatus) -> Result<(), OrderError> {
        let current = self.status;
        if !current.can_transition_to(requested) {
            return Err(OrderError::InvalidTransition { current, requested });
        }
        self.status = requested;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from: current, to: requested }));
        Ok(())
    }

    pub fn summarize(&self, customer_name: Option<&str>) -> OrderSummary {
        OrderSummary {
            id: self.id, customer: customer_name.unwrap_or_default().to_string(), products: self.products.len(),
            total_amount: self.total_amount, status: self.status, created_at: self.created_at,
        }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError { UnknownStatus(String), InvalidTransition { current: OrderStatus, requested: OrderStatus } }
impl std::error::Error for OrderError {}
impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownStatus(s) => write!(f, "Invalid status: {s}"),
            Self::InvalidTransition { current, requested } => write!(f, "Order cannot move from {current} to {requested}"),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_order(customer: Uuid, total: Decimal, created_at: DateTime<Utc>) -> Order {
    let mut order = Order::create(
        customer,
        vec![OrderItem { product: Uuid::new_v4(), color: "black".into(), size: "M".into(), quantity: 1 }],
        total,
        ShippingAddress { street: "1 Marina".into(), city: "Lagos".into(), state: "LA".into(), postal_code: "101001".into(), country: "NG".into() },
        "standard",
    );
    order.created_at = created_at;
    order.updated_at = created_at;
    order
}
