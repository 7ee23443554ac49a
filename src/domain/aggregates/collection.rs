//! Collection Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::product::{non_blank, Product};
use crate::CatalogError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: Uuid,
    /// Unique across all collections.
    pub title: String,
    pub description: String,
    pub image: String,
    pub products: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image: String,
    pub products: Vec<Product>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CollectionInput {
    #[validate(required, custom = "non_blank")]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(required, custom = "non_blank")]
    pub image: Option<String>,
}

/// The three mutable collection fields; updates always supply all of them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionFields { pub title: String, pub description: String, pub image: String }

impl CollectionInput {
    pub fn into_fields(self) -> Result<CollectionFields, CatalogError> {
        self.validate().map_err(CatalogError::from)?;
        let title = self.title.ok_or_else(|| CatalogError::InvalidInput("title is required".into()))?;
        let image = self.image.ok_or_else(|| CatalogError::InvalidInput("image is required".into()))?;
        Ok(CollectionFields { title: title.trim().to_string(), description: self.description.unwrap_or_default(), image })
    }
}

impl Collection {
    pub fn create(fields: CollectionFields) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), title: fields.title, description: fields.description, image: fields.image,
            products: vec![], created_at: now, updated_at: now,
        }
    }

    pub fn overwrite(&mut self, fields: CollectionFields) {
        self.title = fields.title;
        self.description = fields.description;
        self.image = fields.image;
        self.updated_at = Utc::now();
    }

    pub fn contains(&self, product_id: Uuid) -> bool { self.products.contains(&product_id) }

    pub fn populate(self, products: &[Product]) -> CollectionView {
        let resolved = self.products.iter()
            .filter_map(|id| products.iter().find(|p| p.id == *id).cloned())
            .collect();
        CollectionView {
            id: self.id, title: self.title, description: self.description, image: self.image,
            products: resolved, created_at: self.created_at, updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_collection_input(title: &str) -> CollectionInput {
    CollectionInput { title: Some(title.into()), description: Some("Seasonal range".into()), image: Some("https://cdn.example.com/c.png".into()) }
}
