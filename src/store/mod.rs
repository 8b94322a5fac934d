//! Persistence ports for the catalog, carts and orders.
//!
//! Two backends implement them: [`memory`] for tests and database-less runs,
//! and [`postgres`] for production.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::{
    domain::{
        aggregates::{Cart, Order, OrderStatus, Product},
        value_objects::OrderNumber,
    },
    Result,
};

pub use memory::{MemoryCartStore, MemoryCatalogStore, MemoryOrderStore};
pub use postgres::{PgCartStore, PgCatalogStore, PgOrderStore};

#[automock]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Current product document, or `NotFound`.
    async fn get_product(&self, id: Uuid) -> Result<Product>;

    /// Inserts or replaces a product.
    async fn save_product(&self, product: &Product) -> Result<()>;
}

#[automock]
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn get(&self, cart_id: Uuid) -> Result<Cart>;

    async fn find_by_customer(&self, customer_id: Uuid) -> Result<Option<Cart>>;

    /// The customer's cart, created empty on first use. Concurrent callers
    /// for the same customer all receive the same cart.
    async fn find_or_create(&self, customer_id: Uuid) -> Result<Cart>;

    /// Inserts or replaces the whole cart; last write wins.
    async fn save(&self, cart: &Cart) -> Result<()>;

    /// Empties the cart's line items without deleting the cart.
    async fn clear_items(&self, cart_id: Uuid) -> Result<()>;
}

#[automock]
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order. Fails with `Conflict` when the order number or
    /// payment session id is already taken.
    async fn insert(&self, order: &Order) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Order>;

    async fn find_by_order_id(&self, order_id: &OrderNumber) -> Result<Order>;

    async fn find_by_payment_session_id(&self, session_id: &str) -> Result<Order>;

    /// Newest first.
    async fn list_by_customer(&self, customer_id: Uuid) -> Result<Vec<Order>>;

    /// Newest first, with the total count of orders.
    async fn list(&self, page: u32, per_page: u32) -> Result<(Vec<Order>, u64)>;

    /// Atomically sets `status` only if the stored status is one of
    /// `expected`. Returns whether the update was applied.
    async fn update_status(&self, id: Uuid, expected: &[OrderStatus], status: OrderStatus) -> Result<bool>;
}
