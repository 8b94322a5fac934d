//! Cart service: mutations plus on-demand pricing from the live catalog.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    domain::{
        aggregates::Cart,
        value_objects::{line_total, Quantity},
    },
    store::{CartStore, CatalogStore},
    EcommerceError, Result,
};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartLineView {
    pub product_id: Uuid,
    pub name: String,
    pub slug: String,
    pub image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
    pub in_stock: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CartView {
    pub cart_id: Option<Uuid>,
    pub items: Vec<CartLineView>,
    pub total_price: Decimal,
    pub total_quantity: u32,
}

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogStore>,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { carts, catalog }
    }

    pub async fn view(&self, customer_id: Uuid) -> Result<CartView> {
        match self.carts.find_by_customer(customer_id).await? {
            Some(cart) => self.price(&cart).await,
            None => Ok(CartView::default()),
        }
    }

    /// Adds `quantity` of a product, creating the cart on first use.
    #[instrument(skip(self))]
    pub async fn add_item(&self, customer_id: Uuid, product_id: Uuid, quantity: u32) -> Result<CartView> {
        let quantity = Quantity::new(quantity).ok_or_else(|| EcommerceError::Validation("quantity must be positive".into()))?;
        let product = self.catalog.get_product(product_id).await?;
        if !product.active {
            return Err(EcommerceError::NotFound("product"));
        }
        let mut cart = self.carts.find_or_create(customer_id).await?;
        cart.add_item(product_id, quantity);
        self.carts.save(&cart).await?;
        self.price(&cart).await
    }

    #[instrument(skip(self))]
    pub async fn reduce_item(&self, customer_id: Uuid, product_id: Uuid) -> Result<CartView> {
        let mut cart = self.existing(customer_id).await?;
        cart.reduce_item(product_id)?;
        self.carts.save(&cart).await?;
        self.price(&cart).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, customer_id: Uuid, product_id: Uuid) -> Result<CartView> {
        let mut cart = self.existing(customer_id).await?;
        cart.remove_item(product_id)?;
        self.carts.save(&cart).await?;
        self.price(&cart).await
    }

    async fn existing(&self, customer_id: Uuid) -> Result<Cart> {
        self.carts.find_by_customer(customer_id).await?.ok_or(EcommerceError::NotFound("cart"))
    }

    /// Prices each line at the product's current price. Lines whose product
    /// has since disappeared are left out of the totals.
    async fn price(&self, cart: &Cart) -> Result<CartView> {
        let mut view = CartView { cart_id: Some(cart.id), ..CartView::default() };
        for item in &cart.items {
            let product = match self.catalog.get_product(item.product_id).await {
                Ok(product) => product,
                Err(EcommerceError::NotFound(_)) => {
                    warn!(cart_id = %cart.id, product_id = %item.product_id, "cart references missing product");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let unit_price = product.price();
            let total = line_total(unit_price, item.quantity);
            view.total_price += total;
            view.total_quantity = view.total_quantity.saturating_add(item.quantity.value());
            view.items.push(CartLineView {
                product_id: product.id,
                in_stock: product.has_stock_for(item.quantity.value()),
                name: product.name,
                slug: product.slug,
                image: product.image,
                unit_price,
                quantity: item.quantity.value(),
                line_total: total,
            });
        }
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::aggregates::Product,
        store::{MemoryCartStore, MemoryCatalogStore},
    };

    async fn setup() -> (CartService, Product, Product) {
        let catalog = MemoryCatalogStore::new();
        let a = Product::create("Product A", Decimal::new(500, 0), 10);
        let b = Product::create("Product B", Decimal::new(400, 0), 1).with_discount(25);
        catalog.save_product(&a).await.unwrap();
        catalog.save_product(&b).await.unwrap();
        (CartService::new(Arc::new(MemoryCartStore::new()), Arc::new(catalog)), a, b)
    }

    #[tokio::test]
    async fn totals_are_derived_from_current_prices() {
        let (svc, a, b) = setup().await;
        let customer = Uuid::new_v4();
        svc.add_item(customer, a.id, 2).await.unwrap();
        let view = svc.add_item(customer, b.id, 2).await.unwrap();

        assert_eq!(view.total_quantity, 4);
        assert_eq!(view.total_price, Decimal::new(1600, 0));
        assert!(!view.items[1].in_stock);
    }

    #[tokio::test]
    async fn huge_quantities_do_not_overflow_the_view() {
        let (svc, a, b) = setup().await;
        let customer = Uuid::new_v4();
        svc.add_item(customer, a.id, u32::MAX).await.unwrap();
        let view = svc.add_item(customer, b.id, u32::MAX).await.unwrap();
        assert_eq!(view.total_quantity, u32::MAX);
        assert!(!view.items[0].in_stock);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_adds_share_one_cart() {
        let (svc, a, b) = setup().await;
        let customer = Uuid::new_v4();
        let first = tokio::spawn({
            let svc = svc.clone();
            async move { svc.add_item(customer, a.id, 1).await.unwrap().cart_id }
        });
        let second = tokio::spawn({
            let svc = svc.clone();
            async move { svc.add_item(customer, b.id, 1).await.unwrap().cart_id }
        });
        let (first, second) = (first.await.unwrap(), second.await.unwrap());
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn reduce_and_remove() {
        let (svc, a, b) = setup().await;
        let customer = Uuid::new_v4();
        svc.add_item(customer, a.id, 1).await.unwrap();
        svc.add_item(customer, b.id, 1).await.unwrap();

        let view = svc.reduce_item(customer, a.id).await.unwrap();
        assert_eq!(view.items.len(), 1);
        let view = svc.remove_item(customer, b.id).await.unwrap();
        assert!(view.items.is_empty());
        assert!(view.cart_id.is_some());
        assert!(matches!(svc.remove_item(customer, b.id).await, Err(EcommerceError::NotFound("cart item"))));
    }

    #[tokio::test]
    async fn rejects_zero_quantity_and_unknown_products() {
        let (svc, a, _) = setup().await;
        let customer = Uuid::new_v4();
        assert!(matches!(svc.add_item(customer, a.id, 0).await, Err(EcommerceError::Validation(_))));
        assert!(matches!(svc.add_item(customer, Uuid::new_v4(), 1).await, Err(EcommerceError::NotFound("product"))));
        assert_eq!(svc.view(customer).await.unwrap(), CartView::default());
    }
}
