//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::discounted_price;

/// Catalog document consulted for pricing and availability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub image: Option<String>,
    pub mrp: Decimal,
    /// Percentage off the MRP, 0-100.
    pub discount: u8,
    pub stock: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn create(name: impl Into<String>, mrp: Decimal, stock: u32) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            slug: slugify(&name),
            name,
            image: None,
            mrp,
            discount: 0,
            stock,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_discount(mut self, discount: u8) -> Self {
        self.discount = discount.min(100);
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Current selling price.
    pub fn price(&self) -> Decimal { discounted_price(self.mrp, self.discount) }

    pub fn has_stock_for(&self, quantity: u32) -> bool { quantity <= self.stock }

    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}

pub fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
