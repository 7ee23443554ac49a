//! HTTP surface for the back office.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequestParts, Path, State,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::domain::aggregates::{CollectionInput, ProductInput};
use crate::domain::value_objects::CallerId;
use crate::identity::{resolve_caller, IdentityProvider};
use crate::{CatalogError, CatalogService};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CatalogService>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(service: CatalogService, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { service: Arc::new(service), identity }
    }
}

/// The verified caller, if the request carried a recognised bearer token.
/// Handlers pass it through; the service decides whether one is required.
pub struct Caller(pub Option<CallerId>);

impl Caller {
    fn id(&self) -> Option<&CallerId> { self.0.as_ref() }

    /// Unwraps a JSON body, reporting a missing caller ahead of a malformed payload.
    fn body<T>(&self, payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
        if self.0.is_none() { return Err(CatalogError::Unauthenticated); }
        Ok(payload?.0)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let caller = resolve_caller(state.identity.as_ref(), &parts.headers).await;
        if caller.is_none() && parts.headers.contains_key(axum::http::header::AUTHORIZATION) {
            tracing::warn!(uri = %parts.uri, "bearer credential rejected");
        }
        Ok(Self(caller))
    }
}

// =============================================================================
// Errors
// =============================================================================

impl CatalogError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::InvalidInput(_) | Self::Conflict(_) | Self::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::StoreUnavailable(e) => {
                tracing::error!(error = %e, "storage failure");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

impl From<JsonRejection> for CatalogError {
    fn from(rejection: JsonRejection) -> Self { Self::InvalidInput(rejection.body_text()) }
}

impl From<PathRejection> for CatalogError {
    fn from(rejection: PathRejection) -> Self { Self::InvalidInput(rejection.body_text()) }
}

type ApiResult<T> = Result<T, CatalogError>;

fn deleted(what: &str) -> Json<serde_json::Value> { Json(json!({ "message": format!("{what} is deleted") })) }

// =============================================================================
// Router
// =============================================================================

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/products/:id", get(get_product).post(update_product).put(update_product).delete(delete_product))
        .route("/api/collections", get(list_collections).post(create_collection))
        .route("/api/collections/:id", get(get_collection).post(update_collection).put(update_collection).delete(delete_collection))
        .route("/api/orders", get(list_orders))
        .route("/api/orders/:id", get(get_order))
        .route("/api/orders/:id/status", put(update_order_status))
        .route("/api/customers", get(list_customers))
        .route("/api/dashboard", get(dashboard))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}

async fn health(State(s): State<AppState>) -> ApiResult<impl IntoResponse> {
    s.service.store().health_check().await?;
    Ok(Json(json!({ "status": "healthy", "service": "catalog-backoffice" })))
}

// =============================================================================
// Products
// =============================================================================

async fn list_products(State(s): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(s.service.list_products().await?))
}

async fn get_product(State(s): State<AppState>, path: Result<Path<Uuid>, PathRejection>) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    Ok(Json(s.service.get_product(id).await?))
}

async fn create_product(State(s): State<AppState>, caller: Caller, payload: Result<Json<ProductInput>, JsonRejection>) -> ApiResult<impl IntoResponse> {
    let input = caller.body(payload)?;
    Ok(Json(s.service.create_product(input, caller.id()).await?))
}

async fn update_product(State(s): State<AppState>, path: Result<Path<Uuid>, PathRejection>, caller: Caller, payload: Result<Json<ProductInput>, JsonRejection>) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    let input = caller.body(payload)?;
    Ok(Json(s.service.update_product(id, input, caller.id()).await?))
}

async fn delete_product(State(s): State<AppState>, path: Result<Path<Uuid>, PathRejection>, caller: Caller) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    s.service.delete_product(id, caller.id()).await?;
    Ok(deleted("Product"))
}

// =============================================================================
// Collections
// =============================================================================

async fn list_collections(State(s): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(s.service.list_collections().await?))
}

async fn get_collection(State(s): State<AppState>, path: Result<Path<Uuid>, PathRejection>) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    Ok(Json(s.service.get_collection(id).await?))
}

async fn create_collection(State(s): State<AppState>, caller: Caller, payload: Result<Json<CollectionInput>, JsonRejection>) -> ApiResult<impl IntoResponse> {
    let input = caller.body(payload)?;
    Ok((StatusCode::CREATED, Json(s.service.create_collection(input, caller.id()).await?)))
}

async fn update_collection(State(s): State<AppState>, path: Result<Path<Uuid>, PathRejection>, caller: Caller, payload: Result<Json<CollectionInput>, JsonRejection>) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    let input = caller.body(payload)?;
    Ok(Json(s.service.update_collection(id, input, caller.id()).await?))
}

async fn delete_collection(State(s): State<AppState>, path: Result<Path<Uuid>, PathRejection>, caller: Caller) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    s.service.delete_collection(id, caller.id()).await?;
    Ok(deleted("Collection"))
}

// =============================================================================
// Orders, customers, dashboard
// =============================================================================

#[derive(Debug, Deserialize)]
struct StatusUpdate { status: String }

async fn list_orders(State(s): State<AppState>, caller: Caller) -> ApiResult<impl IntoResponse> {
    Ok(Json(s.service.list_orders(caller.id()).await?))
}

async fn get_order(State(s): State<AppState>, path: Result<Path<Uuid>, PathRejection>, caller: Caller) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    let detail = s.service.get_order(id, caller.id()).await?;
    Ok(Json(json!({ "order": detail.order, "customer": detail.customer })))
}

async fn update_order_status(State(s): State<AppState>, path: Result<Path<Uuid>, PathRejection>, caller: Caller, payload: Result<Json<StatusUpdate>, JsonRejection>) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    let body = caller.body(payload)?;
    let order = s.service.transition_order_status(id, &body.status, caller.id()).await?;
    Ok(Json(json!({ "message": "Order status updated successfully.", "order": order })))
}

async fn list_customers(State(s): State<AppState>, caller: Caller) -> ApiResult<impl IntoResponse> {
    Ok(Json(s.service.list_customers(caller.id()).await?))
}

async fn dashboard(State(s): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(s.service.dashboard_metrics().await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::sample_order;
    use crate::domain::events::EventPublisher;
    use crate::identity::StaticTokenIdentity;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::{header, Request};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::Value;
    use tower::ServiceExt;

    const TOKEN: &str = "Bearer s3cret";

    fn app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = CatalogService::new(store.clone(), EventPublisher::disabled());
        let identity = StaticTokenIdentity::new([(CallerId::new("admin-1").unwrap(), "s3cret".to_string())]);
        (build_app(AppState::new(service, Arc::new(identity))), store)
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token { builder = builder.header(header::AUTHORIZATION, token); }
        match body {
            Some(body) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    fn collection_body(title: &str) -> Value {
        json!({ "title": title, "description": "Seasonal range", "image": "https://cdn.example.com/c.png" })
    }

    fn product_body(title: &str, collections: Vec<String>) -> Value {
        json!({
            "title": title, "description": "Soft cotton tee", "media": ["https://cdn.example.com/tee.png"],
            "category": "Tops", "price": 25.5, "expense": 10, "collections": collections,
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let (status, body) = send(&app, request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_mutations_without_token_are_unauthorized() {
        let (app, _) = app();
        let (status, body) = send(&app, request("POST", "/api/collections", None, Some(collection_body("Summer")))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthorized");

        let (status, _) = send(&app, request("POST", "/api/collections", Some("Bearer wrong"), Some(collection_body("Summer")))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, request("GET", "/api/orders", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_collection_create_and_duplicate() {
        let (app, _) = app();
        let (status, body) = send(&app, request("POST", "/api/collections", Some(TOKEN), Some(collection_body("Summer")))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["title"], "Summer");
        assert_eq!(body["products"], json!([]));

        let (status, body) = send(&app, request("POST", "/api/collections", Some(TOKEN), Some(collection_body("Summer")))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Collection already exists");
    }

    #[tokio::test]
    async fn test_malformed_payloads_are_bad_requests() {
        let (app, _) = app();
        let (status, _) = send(&app, request("POST", "/api/collections", Some(TOKEN), Some(json!({ "title": "x", "bogus": 1 })))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = send(&app, request("POST", "/api/products", Some(TOKEN), Some(json!({ "title": "Tee" })))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("description"));
    }

    #[tokio::test]
    async fn test_product_links_show_on_both_sides() {
        let (app, _) = app();
        let (_, collection) = send(&app, request("POST", "/api/collections", Some(TOKEN), Some(collection_body("Summer")))).await;
        let cid = collection["id"].as_str().unwrap().to_string();

        let (status, product) = send(&app, request("POST", "/api/products", Some(TOKEN), Some(product_body("Tee", vec![cid.clone()])))).await;
        assert_eq!(status, StatusCode::OK);
        let pid = product["id"].as_str().unwrap().to_string();

        let (_, view) = send(&app, request("GET", &format!("/api/collections/{cid}"), None, None)).await;
        assert_eq!(view["products"][0]["title"], "Tee");
        let (_, view) = send(&app, request("GET", &format!("/api/products/{pid}"), None, None)).await;
        assert_eq!(view["collections"][0]["title"], "Summer");

        let (status, body) = send(&app, request("DELETE", &format!("/api/collections/{cid}"), Some(TOKEN), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Collection is deleted");
        let (_, view) = send(&app, request("GET", &format!("/api/products/{pid}"), None, None)).await;
        assert_eq!(view["collections"], json!([]));
    }

    #[tokio::test]
    async fn test_malformed_path_id_is_json_bad_request() {
        let (app, _) = app();
        let (status, body) = send(&app, request("GET", "/api/products/not-a-uuid", None, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
        let (status, body) = send(&app, request("PUT", "/api/orders/42/status", Some(TOKEN), Some(json!({ "status": "Shipped" })))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_missing_product_is_not_found() {
        let (app, _) = app();
        let (status, body) = send(&app, request("GET", &format!("/api/products/{}", Uuid::new_v4()), None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Product not found");
    }

    #[tokio::test]
    async fn test_order_status_route() {
        let (app, store) = app();
        let order = sample_order(Uuid::new_v4(), Decimal::new(80, 0), Utc::now());
        let uri = format!("/api/orders/{}/status", order.id);
        store.insert_order(order).await;

        let (status, body) = send(&app, request("PUT", &uri, Some(TOKEN), Some(json!({ "status": "Shipped" })))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Order status updated successfully.");
        assert_eq!(body["order"]["status"], "Shipped");

        let (status, _) = send(&app, request("PUT", &uri, Some(TOKEN), Some(json!({ "status": "Processing" })))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, request("PUT", &uri, None, Some(json!({ "status": "Delivered" })))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let missing = format!("/api/orders/{}/status", Uuid::new_v4());
        let (status, _) = send(&app, request("PUT", &missing, Some(TOKEN), Some(json!({ "status": "Shipped" })))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dashboard_shape() {
        let (app, store) = app();
        store.insert_order(sample_order(Uuid::new_v4(), Decimal::new(80, 0), Utc::now())).await;
        let (status, body) = send(&app, request("GET", "/api/dashboard", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalSales"]["totalOrders"], 1);
        assert_eq!(body["salesPerMonth"].as_array().unwrap().len(), 12);
        assert_eq!(body["salesPerMonth"][0]["monthLabel"], "Jan");
    }
}
