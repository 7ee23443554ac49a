//! Customer Aggregate (read-only here; customers sign up through the storefront)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    /// Subject id at the identity provider.
    #[serde(rename = "firebaseId")]
    pub identity_id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(identity_id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), identity_id: identity_id.into(), name: name.into(), email: email.into(), created_at: now, updated_at: now }
    }
}
