//! In-process stores backed by `DashMap`.
//!
//! Conditional writes hold the entry's shard lock for the whole
//! check-and-set, which gives the same guarantee as the SQL guard.

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;
use uuid::Uuid;

use super::{CartStore, CatalogStore, OrderStore};
use crate::{
    domain::{
        aggregates::{Cart, Order, OrderStatus, Product},
        value_objects::OrderNumber,
    },
    EcommerceError, Result,
};

#[derive(Clone, Debug, Default)]
pub struct MemoryCatalogStore {
    products: Arc<DashMap<Uuid, Product>>,
    slugs: Arc<DashMap<String, Uuid>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn get_product(&self, id: Uuid) -> Result<Product> {
        self.products.get(&id).map(|p| p.clone()).ok_or(EcommerceError::NotFound("product"))
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        match self.slugs.entry(product.slug.clone()) {
            Entry::Occupied(slot) if *slot.get() != product.id => {
                return Err(EcommerceError::Conflict(format!("slug '{}' is already taken", product.slug)));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(product.id);
            }
        }
        if let Some(previous) = self.products.insert(product.id, product.clone()) {
            if previous.slug != product.slug {
                self.slugs.remove_if(&previous.slug, |_, owner| *owner == product.id);
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryCartStore {
    carts: Arc<DashMap<Uuid, Cart>>,
    by_customer: Arc<DashMap<Uuid, Uuid>>,
}

impl MemoryCartStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn get(&self, cart_id: Uuid) -> Result<Cart> {
        self.carts.get(&cart_id).map(|c| c.clone()).ok_or(EcommerceError::NotFound("cart"))
    }

    async fn find_by_customer(&self, customer_id: Uuid) -> Result<Option<Cart>> {
        let Some(cart_id) = self.by_customer.get(&customer_id).map(|id| *id) else { return Ok(None) };
        Ok(self.carts.get(&cart_id).map(|c| c.clone()))
    }

    async fn find_or_create(&self, customer_id: Uuid) -> Result<Cart> {
        let cart_id = match self.by_customer.entry(customer_id) {
            Entry::Occupied(slot) => *slot.get(),
            Entry::Vacant(slot) => {
                let cart = Cart::for_customer(customer_id);
                self.carts.insert(cart.id, cart.clone());
                slot.insert(cart.id);
                return Ok(cart);
            }
        };
        self.get(cart_id).await
    }

    async fn save(&self, cart: &Cart) -> Result<()> {
        let owner = *self.by_customer.entry(cart.customer_id).or_insert(cart.id);
        if owner != cart.id {
            return Err(EcommerceError::Conflict(format!("customer {} already has a cart", cart.customer_id)));
        }
        self.carts.insert(cart.id, cart.clone());
        Ok(())
    }

    async fn clear_items(&self, cart_id: Uuid) -> Result<()> {
        let mut cart = self.carts.get_mut(&cart_id).ok_or(EcommerceError::NotFound("cart"))?;
        cart.clear();
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryOrderStore {
    orders: Arc<DashMap<Uuid, Order>>,
    by_order_id: Arc<DashMap<OrderNumber, Uuid>>,
    by_session: Arc<DashMap<String, Uuid>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self { Self::default() }

    fn get_cloned(&self, id: Uuid) -> Result<Order> {
        self.orders.get(&id).map(|o| o.clone()).ok_or(EcommerceError::NotFound("order"))
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        match self.by_order_id.entry(order.order_id.clone()) {
            Entry::Occupied(_) => return Err(EcommerceError::Conflict(format!("order {} exists", order.order_id))),
            Entry::Vacant(slot) => { slot.insert(order.id); }
        }
        if let Some(session_id) = &order.payment_session_id {
            match self.by_session.entry(session_id.clone()) {
                Entry::Occupied(_) => {
                    self.by_order_id.remove(&order.order_id);
                    return Err(EcommerceError::Conflict(format!("payment session {session_id} already bound")));
                }
                Entry::Vacant(slot) => { slot.insert(order.id); }
            }
        }
        self.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Order> {
        self.get_cloned(id)
    }

    async fn find_by_order_id(&self, order_id: &OrderNumber) -> Result<Order> {
        let id = *self.by_order_id.get(order_id).ok_or(EcommerceError::NotFound("order"))?;
        self.get_cloned(id)
    }

    async fn find_by_payment_session_id(&self, session_id: &str) -> Result<Order> {
        let id = *self.by_session.get(session_id).ok_or(EcommerceError::NotFound("order"))?;
        self.get_cloned(id)
    }

    async fn list_by_customer(&self, customer_id: Uuid) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> =
            self.orders.iter().filter(|o| o.customer_id == customer_id).map(|o| o.clone()).collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list(&self, page: u32, per_page: u32) -> Result<(Vec<Order>, u64)> {
        let mut orders: Vec<Order> = self.orders.iter().map(|o| o.clone()).collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = orders.len() as u64;
        let offset = (page.max(1) - 1) as usize * per_page as usize;
        Ok((orders.into_iter().skip(offset).take(per_page as usize).collect(), total))
    }

    async fn update_status(&self, id: Uuid, expected: &[OrderStatus], status: OrderStatus) -> Result<bool> {
        let mut order = self.orders.get_mut(&id).ok_or(EcommerceError::NotFound("order"))?;
        if !expected.contains(&order.status) {
            return Ok(false);
        }
        order.apply_status(status);
        Ok(true)
    }
}
