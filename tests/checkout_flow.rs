//! End-to-end checkout and reconciliation over in-memory stores.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use uuid::Uuid;

use storefront_orders::{
    domain::{
        aggregates::{Cart, OrderStatus, PaymentMethod, Product, ShippingAddress},
        events::OrderEvent,
    },
    messaging::EventPublisher,
    payments::{
        signature::sign_payload, GatewayError, HostedSession, HostedSessionRequest, PaymentGateway,
        SessionPaymentStatus, WebhookVerifier,
    },
    services::{CartService, CheckoutOrchestrator, CheckoutRequest, OrderService, Reconciler, RedirectUrls, WebhookAck},
    store::{CartStore, CatalogStore, MemoryCartStore, MemoryCatalogStore, MemoryOrderStore, OrderStore},
    EcommerceError,
};

const SECRET: &str = "whsec_flow";

/// Gateway double that hands out sequential session ids and reports
/// whatever status the test sets.
#[derive(Default)]
struct ScriptedGateway {
    sessions: DashMap<String, SessionPaymentStatus>,
    issued: Mutex<u32>,
}

impl ScriptedGateway {
    fn mark(&self, session_id: &str, status: SessionPaymentStatus) {
        self.sessions.insert(session_id.to_string(), status);
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_hosted_session(&self, request: &HostedSessionRequest) -> Result<HostedSession, GatewayError> {
        assert!(!request.line_items.is_empty());
        let mut issued = self.issued.lock().unwrap();
        *issued += 1;
        let session_id = format!("sess_{issued}");
        self.sessions.insert(session_id.clone(), SessionPaymentStatus::Unpaid);
        Ok(HostedSession { redirect_url: format!("https://pay.example.com/{session_id}"), session_id })
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionPaymentStatus, GatewayError> {
        self.sessions
            .get(session_id)
            .map(|s| *s)
            .ok_or_else(|| GatewayError::Rejected { status: 404, message: "No such checkout session".into() })
    }

    async fn expire_session(&self, session_id: &str) -> Result<(), GatewayError> {
        self.mark(session_id, SessionPaymentStatus::Expired);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<OrderEvent>>,
}

impl RecordingPublisher {
    fn status_changes(&self) -> usize {
        self.events.lock().unwrap().iter().filter(|e| matches!(e, OrderEvent::StatusChanged { .. })).count()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: OrderEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct Harness {
    catalog: Arc<MemoryCatalogStore>,
    carts: Arc<MemoryCartStore>,
    orders: Arc<MemoryOrderStore>,
    gateway: Arc<ScriptedGateway>,
    events: Arc<RecordingPublisher>,
    cart_service: CartService,
    checkout: CheckoutOrchestrator,
    reconciler: Reconciler,
}

fn harness() -> Harness {
    let catalog = Arc::new(MemoryCatalogStore::new());
    let carts = Arc::new(MemoryCartStore::new());
    let orders = Arc::new(MemoryOrderStore::new());
    let gateway = Arc::new(ScriptedGateway::default());
    let events = Arc::new(RecordingPublisher::default());

    let order_service = OrderService::new(orders.clone(), events.clone());
    let timeout = Duration::from_secs(2);
    Harness {
        cart_service: CartService::new(carts.clone(), catalog.clone()),
        checkout: CheckoutOrchestrator::new(
            carts.clone(),
            catalog.clone(),
            order_service.clone(),
            gateway.clone(),
            RedirectUrls::new("https://shop.example.com"),
            timeout,
        ),
        reconciler: Reconciler::new(
            order_service,
            gateway.clone(),
            WebhookVerifier::new(SECRET, Duration::from_secs(300)),
            timeout,
        ),
        catalog,
        carts,
        orders,
        gateway,
        events,
    }
}

impl Harness {
    async fn product(&self, price: i64, stock: u32) -> Product {
        let product = Product::create(format!("Item {}", Uuid::new_v4()), Decimal::new(price, 0), stock);
        self.catalog.save_product(&product).await.unwrap();
        product
    }

    async fn cart_for(&self, customer: Uuid) -> Cart {
        self.carts.find_by_customer(customer).await.unwrap().unwrap()
    }

    async fn checkout(&self, customer: Uuid, method: PaymentMethod) -> Result<storefront_orders::services::CheckoutOutcome, EcommerceError> {
        let cart = self.cart_for(customer).await;
        self.checkout
            .checkout(
                customer,
                CheckoutRequest {
                    cart_id: cart.id,
                    payment_method: method,
                    address: ShippingAddress {
                        name: "Ada Buyer".into(),
                        line1: "1 Main St".into(),
                        city: "Springfield".into(),
                        postal_code: "12345".into(),
                        country: "US".into(),
                        ..ShippingAddress::default()
                    },
                    contact_email: "ada@example.com".into(),
                },
            )
            .await
    }

    async fn webhook(&self, kind: &str, session_id: &str) -> Result<WebhookAck, EcommerceError> {
        let payload = serde_json::to_vec(&serde_json::json!({
            "id": "evt_1",
            "type": kind,
            "data": { "object": { "id": session_id, "object": "checkout.session" } }
        }))
        .unwrap();
        let signature = sign_payload(&payload, SECRET, Utc::now()).unwrap();
        self.reconciler.handle_provider_event(&payload, Some(&signature)).await
    }
}

#[tokio::test]
async fn cash_on_delivery_checkout() {
    let h = harness();
    let customer = Uuid::new_v4();
    let a = h.product(500, 10).await;
    let b = h.product(300, 10).await;
    h.cart_service.add_item(customer, a.id, 2).await.unwrap();
    h.cart_service.add_item(customer, b.id, 1).await.unwrap();

    let outcome = h.checkout(customer, PaymentMethod::CashOnDelivery).await.unwrap();

    assert_eq!(outcome.order.status, OrderStatus::Placed);
    assert_eq!(outcome.order.total, Decimal::new(1300, 0));
    assert_eq!(outcome.order.line_items.len(), 2);
    assert!(outcome.redirect_url.ends_with(&format!("/orders/{}/confirmation", outcome.order.order_id)));
    assert!(h.cart_for(customer).await.is_empty());
    assert_eq!(h.cart_service.view(customer).await.unwrap().total_quantity, 0);
}

#[tokio::test]
async fn gateway_checkout_then_webhooks() {
    let h = harness();
    let customer = Uuid::new_v4();
    let a = h.product(500, 10).await;
    h.cart_service.add_item(customer, a.id, 1).await.unwrap();

    let outcome = h.checkout(customer, PaymentMethod::ExternalGateway).await.unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Pending);
    assert_eq!(outcome.order.payment_session_id.as_deref(), Some("sess_1"));
    assert_eq!(outcome.redirect_url, "https://pay.example.com/sess_1");
    assert!(h.cart_for(customer).await.is_empty());

    assert_eq!(h.webhook("checkout.session.completed", "sess_1").await.unwrap(), WebhookAck::Applied);
    assert_eq!(h.webhook("checkout.session.completed", "sess_1").await.unwrap(), WebhookAck::Unchanged);
    assert_eq!(h.webhook("checkout.session.expired", "sess_1").await.unwrap(), WebhookAck::Unchanged);

    let order = h.orders.find_by_payment_session_id("sess_1").await.unwrap();
    assert_eq!(order.status, OrderStatus::Placed);
    assert_eq!(h.events.status_changes(), 1);
}

#[tokio::test]
async fn expired_session_fails_order() {
    let h = harness();
    let customer = Uuid::new_v4();
    let a = h.product(500, 10).await;
    h.cart_service.add_item(customer, a.id, 1).await.unwrap();
    h.checkout(customer, PaymentMethod::ExternalGateway).await.unwrap();

    h.gateway.mark("sess_1", SessionPaymentStatus::Expired);
    let view = h.reconciler.check_session_status(customer, "sess_1").await.unwrap();
    assert!(!view.paid);
    assert_eq!(view.order.status, OrderStatus::Failed);

    assert_eq!(h.webhook("session.completed", "sess_1").await.unwrap(), WebhookAck::Unchanged);
    assert_eq!(h.orders.find_by_payment_session_id("sess_1").await.unwrap().status, OrderStatus::Failed);
}

#[tokio::test]
async fn unpaid_poll_closes_the_session() {
    let h = harness();
    let customer = Uuid::new_v4();
    let a = h.product(500, 10).await;
    h.cart_service.add_item(customer, a.id, 1).await.unwrap();
    h.checkout(customer, PaymentMethod::ExternalGateway).await.unwrap();

    let view = h.reconciler.check_session_status(customer, "sess_1").await.unwrap();
    assert_eq!(view.order.status, OrderStatus::Failed);
    assert_eq!(h.gateway.get_session("sess_1").await.unwrap(), SessionPaymentStatus::Expired);
}

#[tokio::test]
async fn out_of_stock_creates_nothing() {
    let h = harness();
    let customer = Uuid::new_v4();
    let a = h.product(500, 1).await;
    h.cart_service.add_item(customer, a.id, 2).await.unwrap();

    let err = h.checkout(customer, PaymentMethod::ExternalGateway).await.unwrap_err();
    assert!(matches!(err, EcommerceError::OutOfStock { requested: 2, available: 1, .. }));
    assert_eq!(h.orders.list(1, 10).await.unwrap().1, 0);
    assert_eq!(h.cart_for(customer).await.total_quantity(), 2);
    assert!(h.gateway.sessions.is_empty());
}

#[tokio::test]
async fn invalid_signature_is_rejected_without_state_change() {
    let h = harness();
    let customer = Uuid::new_v4();
    let a = h.product(500, 10).await;
    h.cart_service.add_item(customer, a.id, 1).await.unwrap();
    h.checkout(customer, PaymentMethod::ExternalGateway).await.unwrap();

    let payload = br#"{"type":"checkout.session.completed","data":{"object":{"id":"sess_1"}}}"#;
    let forged = sign_payload(payload, "whsec_wrong", Utc::now()).unwrap();
    let err = h.reconciler.handle_provider_event(payload, Some(&forged)).await.unwrap_err();
    assert!(matches!(err, EcommerceError::InvalidSignature));

    let stale = sign_payload(payload, SECRET, Utc::now() - chrono::Duration::minutes(30)).unwrap();
    assert!(h.reconciler.handle_provider_event(payload, Some(&stale)).await.is_err());

    assert_eq!(h.orders.find_by_payment_session_id("sess_1").await.unwrap().status, OrderStatus::Pending);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn webhook_and_poll_race_settles_once() {
    for _ in 0..20 {
        let h = Arc::new(harness());
        let customer = Uuid::new_v4();
        let a = h.product(500, 10).await;
        h.cart_service.add_item(customer, a.id, 1).await.unwrap();
        h.checkout(customer, PaymentMethod::ExternalGateway).await.unwrap();
        h.gateway.mark("sess_1", SessionPaymentStatus::Paid);

        let webhook = {
            let h = h.clone();
            tokio::spawn(async move { h.webhook("checkout.session.completed", "sess_1").await })
        };
        let poll = {
            let h = h.clone();
            tokio::spawn(async move { h.reconciler.check_session_status(customer, "sess_1").await })
        };

        let ack = webhook.await.unwrap().unwrap();
        let view = poll.await.unwrap().unwrap();

        assert!(matches!(ack, WebhookAck::Applied | WebhookAck::Unchanged));
        assert!(view.paid);
        assert_eq!(view.order.status, OrderStatus::Placed);
        assert_eq!(h.orders.find_by_payment_session_id("sess_1").await.unwrap().status, OrderStatus::Placed);
        assert_eq!(h.events.status_changes(), 1);
    }
}
