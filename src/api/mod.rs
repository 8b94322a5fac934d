//! HTTP surface: storefront, admin console and payment-provider webhooks.

pub mod admin;
pub mod error;
pub mod storefront;
pub mod webhooks;

use std::sync::Arc;

use axum::{extract::FromRef, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::{
    auth::Authenticator,
    services::{CartService, CheckoutOrchestrator, OrderService, Reconciler},
    store::CatalogStore,
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub auth: Arc<Authenticator>,
    pub catalog: Arc<dyn CatalogStore>,
    pub carts: CartService,
    pub orders: OrderService,
    pub checkout: CheckoutOrchestrator,
    pub reconciler: Reconciler,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ListParams {
    pub fn page(&self) -> u32 { self.page.unwrap_or(1).max(1) }
    pub fn per_page(&self) -> u32 { self.per_page.unwrap_or(20).clamp(1, 100) }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront-orders"})) }))
        .nest("/api/v1/store", storefront::routes())
        .nest("/api/v1/admin", admin::routes())
        .nest("/api/v1/webhooks", webhooks::routes())
        .with_state(state)
}
