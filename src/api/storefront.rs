//! Customer-facing routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::AppState;
use crate::{
    auth::{AuthContext, Capability},
    domain::{
        aggregates::{Order, PaymentMethod, Product, ShippingAddress},
        value_objects::OrderNumber,
    },
    services::{CartView, CheckoutRequest, SessionStatusView},
    EcommerceError, Result,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products/:id", get(get_product))
        .route("/cart", get(get_cart))
        .route("/cart/items", post(add_cart_item))
        .route("/cart/items/:product_id/reduce", post(reduce_cart_item))
        .route("/cart/items/:product_id", delete(remove_cart_item))
        .route("/checkout", post(checkout))
        .route("/checkout/sessions/:session_id", get(session_status))
        .route("/orders", get(list_orders))
        .route("/orders/:order_id", get(get_order))
        .route("/orders/:order_id/cancel", post(cancel_order))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 999))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutBody {
    pub cart_id: Uuid,
    pub payment_method: PaymentMethod,
    #[validate]
    pub address: ShippingAddress,
    #[validate(email)]
    pub contact_email: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub redirect_url: String,
    pub order_id: OrderNumber,
}

/// Unparsable order numbers cannot name an existing order.
pub(super) fn order_number(raw: String) -> Result<OrderNumber> {
    OrderNumber::parse(raw).map_err(|_| EcommerceError::NotFound("order"))
}

async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Product>> {
    let product = s.catalog.get_product(id).await?;
    if !product.active {
        return Err(EcommerceError::NotFound("product"));
    }
    Ok(Json(product))
}

async fn get_cart(State(s): State<AppState>, ctx: AuthContext) -> Result<Json<CartView>> {
    ctx.require(Capability::ManageCart)?;
    Ok(Json(s.carts.view(ctx.user_id).await?))
}

async fn add_cart_item(
    State(s): State<AppState>,
    ctx: AuthContext,
    Json(r): Json<AddCartItemRequest>,
) -> Result<Json<CartView>> {
    ctx.require(Capability::ManageCart)?;
    r.validate()?;
    Ok(Json(s.carts.add_item(ctx.user_id, r.product_id, r.quantity).await?))
}

async fn reduce_cart_item(
    State(s): State<AppState>,
    ctx: AuthContext,
    Path(product_id): Path<Uuid>,
) -> Result<Json<CartView>> {
    ctx.require(Capability::ManageCart)?;
    Ok(Json(s.carts.reduce_item(ctx.user_id, product_id).await?))
}

async fn remove_cart_item(
    State(s): State<AppState>,
    ctx: AuthContext,
    Path(product_id): Path<Uuid>,
) -> Result<Json<CartView>> {
    ctx.require(Capability::ManageCart)?;
    Ok(Json(s.carts.remove_item(ctx.user_id, product_id).await?))
}

async fn checkout(
    State(s): State<AppState>,
    ctx: AuthContext,
    Json(r): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    ctx.require(Capability::Checkout)?;
    r.validate()?;
    let outcome = s
        .checkout
        .checkout(
            ctx.user_id,
            CheckoutRequest {
                cart_id: r.cart_id,
                payment_method: r.payment_method,
                address: r.address,
                contact_email: r.contact_email,
            },
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse { redirect_url: outcome.redirect_url, order_id: outcome.order.order_id }),
    ))
}

async fn session_status(
    State(s): State<AppState>,
    ctx: AuthContext,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStatusView>> {
    ctx.require(Capability::ViewOwnOrders)?;
    Ok(Json(s.reconciler.check_session_status(ctx.user_id, &session_id).await?))
}

async fn list_orders(State(s): State<AppState>, ctx: AuthContext) -> Result<Json<Vec<Order>>> {
    ctx.require(Capability::ViewOwnOrders)?;
    Ok(Json(s.orders.list_for_customer(ctx.user_id).await?))
}

async fn get_order(State(s): State<AppState>, ctx: AuthContext, Path(order_id): Path<String>) -> Result<Json<Order>> {
    ctx.require(Capability::ViewOwnOrders)?;
    Ok(Json(s.orders.get_for_customer(ctx.user_id, &order_number(order_id)?).await?))
}

async fn cancel_order(State(s): State<AppState>, ctx: AuthContext, Path(order_id): Path<String>) -> Result<Json<Order>> {
    ctx.require(Capability::CancelOwnOrder)?;
    Ok(Json(s.orders.cancel(ctx.user_id, &order_number(order_id)?).await?))
}
