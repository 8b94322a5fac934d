//! Admin console routes: catalog maintenance and order status overrides.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{storefront::order_number, AppState, ListParams, PaginatedResponse};
use crate::{
    auth::{AuthContext, Capability},
    domain::aggregates::{product::slugify, Order, OrderStatus, Product},
    EcommerceError, Result,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product))
        .route("/orders", get(list_orders))
        .route("/orders/:order_id/status", patch(set_order_status))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub mrp: Decimal,
    #[serde(default)]
    #[validate(range(max = 100))]
    pub discount: u8,
    pub stock: u32,
    #[validate(url)]
    pub image: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool { true }

impl ProductRequest {
    fn check(&self) -> Result<()> {
        self.validate()?;
        if self.mrp.is_sign_negative() {
            return Err(EcommerceError::Validation("mrp must not be negative".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

async fn create_product(
    State(s): State<AppState>,
    ctx: AuthContext,
    Json(r): Json<ProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    ctx.require(Capability::ManageCatalog)?;
    r.check()?;
    let mut product = Product::create(r.name, r.mrp, r.stock).with_discount(r.discount);
    product.image = r.image;
    product.active = r.active;
    s.catalog.save_product(&product).await?;
    info!(product_id = %product.id, slug = %product.slug, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(s): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(r): Json<ProductRequest>,
) -> Result<Json<Product>> {
    ctx.require(Capability::ManageCatalog)?;
    r.check()?;
    let mut product = s.catalog.get_product(id).await?;
    product.slug = slugify(&r.name);
    product.name = r.name;
    product.mrp = r.mrp;
    product.discount = r.discount;
    product.stock = r.stock;
    product.image = r.image;
    product.active = r.active;
    product.touch();
    s.catalog.save_product(&product).await?;
    Ok(Json(product))
}

async fn list_orders(
    State(s): State<AppState>,
    ctx: AuthContext,
    Query(p): Query<ListParams>,
) -> Result<Json<PaginatedResponse<Order>>> {
    ctx.require(Capability::ViewAllOrders)?;
    let (data, total) = s.orders.list_all(p.page(), p.per_page()).await?;
    Ok(Json(PaginatedResponse { data, total, page: p.page() }))
}

async fn set_order_status(
    State(s): State<AppState>,
    ctx: AuthContext,
    Path(order_id): Path<String>,
    Json(r): Json<StatusRequest>,
) -> Result<Json<Order>> {
    ctx.require(Capability::ManageOrders)?;
    let status: OrderStatus = r.status.parse()?;
    let order = s.orders.set_status(&order_number(order_id)?, status).await?;
    info!(order_id = %order.order_id, status = %order.status, admin = %ctx.user_id, "order status set by admin");
    Ok(Json(order))
}
