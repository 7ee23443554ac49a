//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::collection::Collection;
use crate::CatalogError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub media: Vec<String>,
    pub category: String,
    pub price: Decimal,
    pub old_price: Option<Decimal>,
    pub expense: Decimal,
    pub quantity: i32,
    pub tags: Vec<String>,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub material: Option<String>,
    /// Ids of the collections this product belongs to, without duplicates.
    pub collections: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product with its collection references resolved.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub media: Vec<String>,
    pub category: String,
    pub price: Decimal,
    pub old_price: Option<Decimal>,
    pub expense: Decimal,
    pub quantity: i32,
    pub tags: Vec<String>,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub material: Option<String>,
    pub collections: Vec<Collection>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload as it arrives at the boundary.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProductInput {
    #[validate(required, custom = "non_blank")]
    pub title: Option<String>,
    #[validate(required, custom = "non_blank")]
    pub description: Option<String>,
    #[validate(required, length(min = 1, message = "at least one media url is required"))]
    pub media: Option<Vec<String>>,
    #[validate(required, custom = "non_blank")]
    pub category: Option<String>,
    #[validate(required)]
    pub price: Option<Decimal>,
    pub old_price: Option<Decimal>,
    #[validate(required)]
    pub expense: Option<Decimal>,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    pub material: Option<String>,
    #[serde(default)]
    pub collections: Vec<Uuid>,
}

/// Every mutable product field, validated.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductFields {
    pub title: String,
    pub description: String,
    pub media: Vec<String>,
    pub category: String,
    pub price: Decimal,
    pub old_price: Option<Decimal>,
    pub expense: Decimal,
    pub quantity: i32,
    pub tags: Vec<String>,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub material: Option<String>,
    pub collections: Vec<Uuid>,
}

pub(crate) fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() { return Err(ValidationError::new("blank")); }
    Ok(())
}

fn missing(field: &str) -> CatalogError { CatalogError::InvalidInput(format!("{field} is required")) }

/// De-duplicates ids, keeping the first occurrence of each.
pub fn dedup_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

impl ProductInput {
    pub fn into_fields(self) -> Result<ProductFields, CatalogError> {
        self.validate().map_err(CatalogError::from)?;
        let price = self.price.ok_or_else(|| missing("price"))?;
        let expense = self.expense.ok_or_else(|| missing("expense"))?;
        if price <= Decimal::ZERO { return Err(CatalogError::InvalidInput("price must be greater than zero".into())); }
        if expense < Decimal::ZERO { return Err(CatalogError::InvalidInput("expense cannot be negative".into())); }
        if self.old_price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(CatalogError::InvalidInput("oldPrice cannot be negative".into()));
        }
        Ok(ProductFields {
            title: self.title.ok_or_else(|| missing("title"))?.trim().to_string(),
            description: self.description.ok_or_else(|| missing("description"))?,
            media: self.media.ok_or_else(|| missing("media"))?,
            category: self.category.ok_or_else(|| missing("category"))?.trim().to_string(),
            price,
            old_price: self.old_price,
            expense,
            quantity: self.quantity.unwrap_or(0),
            tags: self.tags,
            sizes: self.sizes,
            colors: self.colors,
            material: self.material.filter(|m| !m.trim().is_empty()),
            collections: dedup_ids(&self.collections),
        })
    }
}

impl Product {
    pub fn create(fields: ProductFields) -> Self {
        let now = Utc::now();
        let mut product = Self {
            id: Uuid::now_v7(), title: String::new(), description: String::new(), media: vec![],
            category: String::new(), price: Decimal::ZERO, old_price: None, expense: Decimal::ZERO,
            quantity: 0, tags: vec![], sizes: vec![], colors: vec![], material: None,
            collections: vec![], created_at: now, updated_at: now,
        };
        product.overwrite(fields);
        product
    }

    /// Replaces every mutable field; there is no partial-update mode.
    pub fn overwrite(&mut self, fields: ProductFields) {
        self.title = fields.title;
        self.description = fields.description;
        self.media = fields.media;
        self.category = fields.category;
        self.price = fields.price;
        self.old_price = fields.old_price;
        self.expense = fields.expense;
        self.quantity = fields.quantity;
        self.tags = fields.tags;
        self.sizes = fields.sizes;
        self.colors = fields.colors;
        self.material = fields.material;
        self.collections = dedup_ids(&fields.collections);
        self.touch();
    }

    pub fn forget_collections(&mut self, ids: &[Uuid]) { self.collections.retain(|c| !ids.contains(c)); }

    /// Resolves collection references. Ids without a matching collection are dropped.
    pub fn populate(self, collections: &[Collection]) -> ProductView {
        let resolved = self.collections.iter()
            .filter_map(|id| collections.iter().find(|c| c.id == *id).cloned())
            .collect();
        ProductView {
            id: self.id, title: self.title, description: self.description, media: self.media,
            category: self.category, price: self.price, old_price: self.old_price, expense: self.expense,
            quantity: self.quantity, tags: self.tags, sizes: self.sizes, colors: self.colors,
            material: self.material, collections: resolved, created_at: self.created_at, updated_at: self.updated_at,
        }
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[cfg(test)]
pub(crate) fn sample_input(title: &str, collections: Vec<Uuid>) -> ProductInput {
    ProductInput {
        title: Some(title.into()), description: Some("Soft cotton tee".into()),
        media: Some(vec!["https://cdn.example.com/tee.png".into()]), category: Some("Tops".into()),
        price: Some(Decimal::new(2500, 2)), expense: Some(Decimal::new(1000, 2)),
        collections, ..Default::default()
    }
}
