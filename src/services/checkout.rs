//! Checkout orchestration: live cart → priced snapshot → durable order.
//!
//! Stock is validated against the catalog at call time but not reserved;
//! two concurrent checkouts for the last unit can both succeed. Decrementing
//! stock happens at fulfillment.

use std::{future::Future, sync::Arc, time::Duration};

use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    domain::{
        aggregates::{
            Cart, LineItemSnapshot, NewOrder, Order, PaymentMethod, ProductSnapshot, ShippingAddress,
        },
        value_objects::line_total,
    },
    payments::{CheckoutLineItem, GatewayError, HostedSessionRequest, PaymentGateway},
    services::orders::OrderService,
    store::{CartStore, CatalogStore},
    EcommerceError, Result,
};

/// Placeholder the provider substitutes with the real session id.
const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

#[derive(Clone, Debug)]
pub struct CheckoutRequest {
    pub cart_id: Uuid,
    pub payment_method: PaymentMethod,
    pub address: ShippingAddress,
    pub contact_email: String,
}

#[derive(Clone, Debug)]
pub struct CheckoutOutcome {
    pub redirect_url: String,
    pub order: Order,
}

/// Cart contents frozen at checkout time.
#[derive(Clone, Debug, PartialEq)]
pub struct PricedCart {
    pub line_items: Vec<LineItemSnapshot>,
    pub total: Decimal,
    pub total_quantity: u32,
}

#[derive(Clone, Debug)]
pub struct RedirectUrls {
    storefront_url: String,
}

impl RedirectUrls {
    pub fn new(storefront_url: impl Into<String>) -> Self {
        Self { storefront_url: storefront_url.into().trim_end_matches('/').to_string() }
    }

    pub fn success(&self) -> String {
        format!("{}/checkout/success?session_id={SESSION_ID_PLACEHOLDER}", self.storefront_url)
    }

    pub fn cancel(&self) -> String { format!("{}/cart", self.storefront_url) }

    pub fn confirmation(&self, order: &Order) -> String {
        format!("{}/orders/{}/confirmation", self.storefront_url, order.order_id)
    }
}

#[derive(Clone)]
pub struct CheckoutOrchestrator {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogStore>,
    orders: OrderService,
    gateway: Arc<dyn PaymentGateway>,
    urls: RedirectUrls,
    gateway_timeout: Duration,
}

impl CheckoutOrchestrator {
    pub fn new(
        carts: Arc<dyn CartStore>,
        catalog: Arc<dyn CatalogStore>,
        orders: OrderService,
        gateway: Arc<dyn PaymentGateway>,
        urls: RedirectUrls,
        gateway_timeout: Duration,
    ) -> Self {
        Self { carts, catalog, orders, gateway, urls, gateway_timeout }
    }

    /// Turns the customer's cart into an order and returns where to send the
    /// client next. Nothing is persisted unless the whole call succeeds up to
    /// order creation.
    #[instrument(skip(self, request), fields(cart_id = %request.cart_id, method = ?request.payment_method))]
    pub async fn checkout(&self, customer_id: Uuid, request: CheckoutRequest) -> Result<CheckoutOutcome> {
        let cart = self.carts.get(request.cart_id).await?;
        if !cart.is_owned_by(customer_id) {
            warn!(%customer_id, owner = %cart.customer_id, "checkout attempted on foreign cart");
            return Err(EcommerceError::NotFound("cart"));
        }

        let priced = self.price_cart(&cart).await?;

        let new_order = NewOrder {
            customer_id,
            shipping_address: request.address,
            contact_email: request.contact_email,
            line_items: priced.line_items,
            total: priced.total,
            payment_method: request.payment_method,
            payment_session_id: None,
        };

        let outcome = match request.payment_method {
            PaymentMethod::CashOnDelivery => {
                let order = self.orders.create(new_order).await?;
                CheckoutOutcome { redirect_url: self.urls.confirmation(&order), order }
            }
            PaymentMethod::ExternalGateway => self.checkout_with_gateway(new_order).await?,
        };

        if let Err(e) = self.carts.clear_items(cart.id).await {
            warn!(cart_id = %cart.id, order_id = %outcome.order.order_id, error = %e, "order placed but cart not cleared");
        }

        info!(order_id = %outcome.order.order_id, status = %outcome.order.status, "checkout complete");
        Ok(outcome)
    }

    /// Re-reads every product so price and stock reflect the catalog now,
    /// not when the items were added.
    pub async fn price_cart(&self, cart: &Cart) -> Result<PricedCart> {
        let total_quantity = cart.total_quantity();
        if total_quantity == 0 {
            return Err(EcommerceError::EmptyCart);
        }

        let mut line_items = Vec::with_capacity(cart.items.len());
        let mut total = Decimal::ZERO;
        for item in &cart.items {
            let product = self.catalog.get_product(item.product_id).await?;
            if !product.active {
                return Err(EcommerceError::NotFound("product"));
            }
            let requested = item.quantity.value();
            if !product.has_stock_for(requested) {
                return Err(EcommerceError::OutOfStock { product_id: product.id, requested, available: product.stock });
            }
            let price = product.price();
            let amount = line_total(price, item.quantity);
            total += amount;
            line_items.push(LineItemSnapshot {
                product: ProductSnapshot {
                    id: product.id,
                    name: product.name,
                    image: product.image,
                    price,
                    slug: product.slug,
                },
                quantity: item.quantity,
                line_total: amount,
            });
        }

        Ok(PricedCart { line_items, total, total_quantity })
    }

    async fn checkout_with_gateway(&self, mut new_order: NewOrder) -> Result<CheckoutOutcome> {
        let request = HostedSessionRequest {
            line_items: new_order
                .line_items
                .iter()
                .map(|item| CheckoutLineItem {
                    name: item.product.name.clone(),
                    image: item.product.image.clone(),
                    unit_price: item.product.price,
                    quantity: item.quantity.value(),
                })
                .collect(),
            success_url: self.urls.success(),
            cancel_url: self.urls.cancel(),
            customer_email: new_order.contact_email.clone(),
        };

        let session = bounded(self.gateway_timeout, self.gateway.create_hosted_session(&request)).await?;
        new_order.payment_session_id = Some(session.session_id.clone());

        // The order must exist before the client can reach the payment page.
        let order = match self.orders.create(new_order).await {
            Ok(order) => order,
            Err(e) => {
                error!(session_id = %session.session_id, error = %e, "payment session opened but order not persisted");
                if let Err(expire) = bounded(self.gateway_timeout, self.gateway.expire_session(&session.session_id)).await {
                    error!(session_id = %session.session_id, error = %expire, "could not expire orphaned payment session");
                }
                return Err(e);
            }
        };

        Ok(CheckoutOutcome { redirect_url: session.redirect_url, order })
    }
}

/// Runs a gateway call under a deadline; running out of time is a failure.
pub(crate) async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = std::result::Result<T, GatewayError>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(EcommerceError::from),
        Err(_) => Err(GatewayError::Timeout.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{aggregates::Product, value_objects::Quantity},
        messaging::NoopPublisher,
        payments::{HostedSession, MockPaymentGateway},
        store::{MemoryCartStore, MemoryCatalogStore, MemoryOrderStore, MockOrderStore, OrderStore},
    };

    struct Fixture {
        carts: Arc<MemoryCartStore>,
        catalog: Arc<MemoryCatalogStore>,
        orders: Arc<MemoryOrderStore>,
        customer: Uuid,
        cart: Cart,
    }

    async fn fixture(lines: &[(Decimal, u32, u32)]) -> Fixture {
        let carts = Arc::new(MemoryCartStore::new());
        let catalog = Arc::new(MemoryCatalogStore::new());
        let customer = Uuid::new_v4();
        let mut cart = Cart::for_customer(customer);
        for (i, (price, stock, qty)) in lines.iter().enumerate() {
            let product = Product::create(format!("Product {i}"), *price, *stock);
            catalog.save_product(&product).await.unwrap();
            cart.add_item(product.id, Quantity::new(*qty).unwrap());
        }
        carts.save(&cart).await.unwrap();
        Fixture { carts, catalog, orders: Arc::new(MemoryOrderStore::new()), customer, cart }
    }

    fn orchestrator(f: &Fixture, orders: Arc<dyn OrderStore>, gateway: MockPaymentGateway) -> CheckoutOrchestrator {
        CheckoutOrchestrator::new(
            f.carts.clone(),
            f.catalog.clone(),
            OrderService::new(orders, Arc::new(NoopPublisher)),
            Arc::new(gateway),
            RedirectUrls::new("https://shop.example.com/"),
            Duration::from_millis(100),
        )
    }

    fn request(f: &Fixture, method: PaymentMethod) -> CheckoutRequest {
        CheckoutRequest {
            cart_id: f.cart.id,
            payment_method: method,
            address: ShippingAddress::default(),
            contact_email: "buyer@example.com".into(),
        }
    }

    #[tokio::test]
    async fn gateway_failure_creates_no_order_and_keeps_cart() {
        let f = fixture(&[(Decimal::new(500, 0), 5, 1)]).await;
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_hosted_session()
            .returning(|_| Err(GatewayError::Rejected { status: 402, message: "card_declined".into() }));
        let svc = orchestrator(&f, f.orders.clone(), gateway);

        let err = svc.checkout(f.customer, request(&f, PaymentMethod::ExternalGateway)).await.unwrap_err();
        assert!(matches!(err, EcommerceError::PaymentGateway(_)));
        assert_eq!(f.orders.list(1, 10).await.unwrap().1, 0);
        assert_eq!(f.carts.get(f.cart.id).await.unwrap().items.len(), 1);
    }

    struct StalledGateway;

    #[async_trait::async_trait]
    impl PaymentGateway for StalledGateway {
        async fn create_hosted_session(&self, _: &HostedSessionRequest) -> std::result::Result<HostedSession, GatewayError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(HostedSession { session_id: "sess_slow".into(), redirect_url: "https://pay".into() })
        }

        async fn get_session(&self, _: &str) -> std::result::Result<crate::payments::SessionPaymentStatus, GatewayError> {
            unreachable!()
        }

        async fn expire_session(&self, _: &str) -> std::result::Result<(), GatewayError> { Ok(()) }
    }

    #[tokio::test]
    async fn cash_on_delivery_places_order_and_clears_cart() {
        let f = fixture(&[(Decimal::new(500, 0), 5, 2), (Decimal::new(300, 0), 1, 1)]).await;
        let svc = orchestrator(&f, f.orders.clone(), MockPaymentGateway::new());

        let outcome = svc.checkout(f.customer, request(&f, PaymentMethod::CashOnDelivery)).await.unwrap();
        assert_eq!(outcome.order.total, Decimal::new(1300, 0));
        assert_eq!(outcome.order.status, crate::domain::aggregates::OrderStatus::Placed);
        assert_eq!(
            outcome.redirect_url,
            format!("https://shop.example.com/orders/{}/confirmation", outcome.order.order_id)
        );
        assert!(f.carts.get(f.cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn gateway_checkout_records_session() {
        let f = fixture(&[(Decimal::new(500, 0), 5, 2)]).await;
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_hosted_session()
            .withf(|req| req.line_items.len() == 1 && req.line_items[0].quantity == 2 && req.cancel_url.ends_with("/cart"))
            .returning(|_| Ok(HostedSession { session_id: "sess_123".into(), redirect_url: "https://pay/sess_123".into() }));
        let svc = orchestrator(&f, f.orders.clone(), gateway);

        let outcome = svc.checkout(f.customer, request(&f, PaymentMethod::ExternalGateway)).await.unwrap();
        assert_eq!(outcome.redirect_url, "https://pay/sess_123");
        assert_eq!(outcome.order.payment_session_id.as_deref(), Some("sess_123"));
        assert_eq!(outcome.order.status, crate::domain::aggregates::OrderStatus::Pending);
        assert_eq!(f.orders.find_by_payment_session_id("sess_123").await.unwrap().id, outcome.order.id);
        assert!(f.carts.get(f.cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn slow_gateway_counts_as_failure() {
        let f = fixture(&[(Decimal::new(500, 0), 5, 1)]).await;
        let mut svc = orchestrator(&f, f.orders.clone(), MockPaymentGateway::new());
        svc.gateway = Arc::new(StalledGateway);
        svc.gateway_timeout = Duration::from_millis(20);

        let err = svc.checkout(f.customer, request(&f, PaymentMethod::ExternalGateway)).await.unwrap_err();
        assert!(matches!(err, EcommerceError::PaymentGateway(_)));
        assert_eq!(f.orders.list(1, 10).await.unwrap().1, 0);
    }

    #[tokio::test]
    async fn persistence_failure_expires_the_session() {
        let f = fixture(&[(Decimal::new(500, 0), 5, 1)]).await;
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_hosted_session()
            .returning(|_| Ok(HostedSession { session_id: "sess_9".into(), redirect_url: "https://pay/sess_9".into() }));
        gateway.expect_expire_session().withf(|id| id == "sess_9").times(1).returning(|_| Ok(()));
        let mut orders = MockOrderStore::new();
        orders.expect_insert().returning(|_| Err(EcommerceError::Storage("connection reset".into())));
        let svc = orchestrator(&f, Arc::new(orders), gateway);

        let err = svc.checkout(f.customer, request(&f, PaymentMethod::ExternalGateway)).await.unwrap_err();
        assert!(matches!(err, EcommerceError::Storage(_)));
        assert_eq!(f.carts.get(f.cart.id).await.unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn stock_is_read_at_call_time() {
        let f = fixture(&[(Decimal::new(500, 0), 5, 3)]).await;
        let svc = orchestrator(&f, f.orders.clone(), MockPaymentGateway::new());

        let mut product = f.catalog.get_product(f.cart.items[0].product_id).await.unwrap();
        product.stock = 2;
        f.catalog.save_product(&product).await.unwrap();

        let err = svc.checkout(f.customer, request(&f, PaymentMethod::CashOnDelivery)).await.unwrap_err();
        assert!(matches!(err, EcommerceError::OutOfStock { requested: 3, available: 2, .. }));
        assert_eq!(f.orders.list(1, 10).await.unwrap().1, 0);
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let f = fixture(&[]).await;
        let svc = orchestrator(&f, f.orders.clone(), MockPaymentGateway::new());
        let err = svc.checkout(f.customer, request(&f, PaymentMethod::CashOnDelivery)).await.unwrap_err();
        assert!(matches!(err, EcommerceError::EmptyCart));
    }

    #[tokio::test]
    async fn foreign_cart_is_not_found() {
        let f = fixture(&[(Decimal::new(500, 0), 5, 1)]).await;
        let svc = orchestrator(&f, f.orders.clone(), MockPaymentGateway::new());
        let err = svc.checkout(Uuid::new_v4(), request(&f, PaymentMethod::CashOnDelivery)).await.unwrap_err();
        assert!(matches!(err, EcommerceError::NotFound("cart")));
        assert_eq!(f.carts.get(f.cart.id).await.unwrap().items.len(), 1);
    }

    #[test]
    fn redirect_urls() {
        let urls = RedirectUrls::new("https://shop.example.com/");
        assert_eq!(urls.cancel(), "https://shop.example.com/cart");
        assert_eq!(urls.success(), "https://shop.example.com/checkout/success?session_id={CHECKOUT_SESSION_ID}");
    }
}
