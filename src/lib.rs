//! Catalog back office
//!
//! Administrative core for a retail catalog.
//!
//! ## Features
//! - Products and collections with a mutually consistent many-to-many link
//! - Forward-only order fulfillment status
//! - Period-over-period sales and customer metrics for the dashboard

pub mod analytics;
pub mod api;
pub mod config;
pub mod domain;
pub mod identity;
pub mod service;
pub mod store;
pub mod sync;

use thiserror::Error;

use crate::domain::aggregates::{OrderError, OrderStatus};
use crate::store::StoreError;

pub use crate::service::CatalogService;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Unauthorized")]
    Unauthenticated,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Order cannot move from {current} to {requested}")]
    InvalidTransition { current: OrderStatus, requested: OrderStatus },

    #[error("Storage error: {0}")]
    StoreUnavailable(StoreError),
}

impl From<StoreError> for CatalogError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(detail) => Self::Conflict(format!("Already exists: {detail}")),
            other => Self::StoreUnavailable(other),
        }
    }
}

impl From<OrderError> for CatalogError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::UnknownStatus(s) => Self::InvalidInput(format!("unrecognized order status {s:?}")),
            OrderError::InvalidTransition { current, requested } => Self::InvalidTransition { current, requested },
        }
    }
}

impl From<validator::ValidationErrors> for CatalogError {
    fn from(e: validator::ValidationErrors) -> Self {
        let mut fields: Vec<&str> = e.field_errors().into_keys().collect();
        fields.sort_unstable();
        Self::InvalidInput(format!("missing or invalid fields: {}", fields.join(", ")))
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
