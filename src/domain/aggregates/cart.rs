//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::Quantity;

/// Per-customer mutable list of product references. Prices are never stored
/// here; totals are derived from the live catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub quantity: Quantity,
}

impl Cart {
    pub fn for_customer(customer_id: Uuid) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), customer_id, items: vec![], created_at: now, updated_at: now }
    }

    pub fn is_owned_by(&self, customer_id: Uuid) -> bool { self.customer_id == customer_id }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn total_quantity(&self) -> u32 {
        self.items.iter().fold(0u32, |acc, i| acc.saturating_add(i.quantity.value()))
    }

    /// Adds to an existing line or appends a new one; a product appears at most once.
    pub fn add_item(&mut self, product_id: Uuid, quantity: Quantity) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            existing.quantity = existing.quantity.add(quantity);
        } else {
            self.items.push(CartItem { product_id, quantity });
        }
        self.touch();
    }

    /// Decrements a line by one, dropping it when it reaches zero.
    pub fn reduce_item(&mut self, product_id: Uuid) -> Result<(), CartError> {
        let index = self.items.iter().position(|i| i.product_id == product_id).ok_or(CartError::ItemNotFound)?;
        match self.items[index].quantity.decrement() {
            Some(q) => self.items[index].quantity = q,
            None => { self.items.remove(index); }
        }
        self.touch();
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: Uuid) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) { self.items.clear(); self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { ItemNotFound }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "Item not found") }
}

impl From<CartError> for crate::EcommerceError {
    fn from(_: CartError) -> Self { Self::NotFound("cart item") }
}
