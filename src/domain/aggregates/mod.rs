//! Aggregates module
pub mod product;
pub mod collection;
pub mod order;
pub mod customer;

pub use product::{dedup_ids, Product, ProductFields, ProductInput, ProductView};
pub use collection::{Collection, CollectionFields, CollectionInput, CollectionView};
pub use order::{Order, OrderDetail, OrderError, OrderItem, OrderStatus, OrderSummary, ShippingAddress};
pub use customer::Customer;
