//! Identity provider seam.
//!
//! Credential verification belongs to an external provider; the rest of the
//! crate only needs to turn a bearer credential into a caller id, or nothing.

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use std::collections::HashMap;

use crate::domain::value_objects::CallerId;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves a bearer credential to the subject it was issued to.
    async fn verify(&self, bearer: &str) -> Option<CallerId>;
}

/// Fixed token → subject table, configured through `BACKOFFICE_API_TOKENS`.
#[derive(Clone, Debug, Default)]
pub struct StaticTokenIdentity { subjects: HashMap<String, CallerId> }

impl StaticTokenIdentity {
    pub fn new(pairs: impl IntoIterator<Item = (CallerId, String)>) -> Self {
        Self { subjects: pairs.into_iter().map(|(subject, token)| (token, subject)).collect() }
    }

    pub fn is_empty(&self) -> bool { self.subjects.is_empty() }
}

#[async_trait]
impl IdentityProvider for StaticTokenIdentity {
    async fn verify(&self, bearer: &str) -> Option<CallerId> { self.subjects.get(bearer).cloned() }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Missing header, wrong scheme and unknown token all resolve to `None`.
pub async fn resolve_caller(provider: &dyn IdentityProvider, headers: &HeaderMap) -> Option<CallerId> {
    let token = bearer_token(headers)?;
    provider.verify(token).await
}
