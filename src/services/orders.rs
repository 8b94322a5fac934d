//! Order service: creation and guarded status transitions.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    domain::{
        aggregates::{NewOrder, Order, OrderStatus, Transition, TransitionPlan},
        events::OrderEvent,
        value_objects::OrderNumber,
    },
    messaging::EventPublisher,
    store::OrderStore,
    EcommerceError, Result,
};

const CREATE_ATTEMPTS: usize = 3;
const TRANSITION_ATTEMPTS: usize = 3;

/// Result of a transition request.
#[derive(Clone, Debug, PartialEq)]
pub struct Transitioned {
    pub order: Order,
    /// False when the request was a no-op (re-delivery or superseded signal).
    pub applied: bool,
}

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    events: Arc<dyn EventPublisher>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderStore>, events: Arc<dyn EventPublisher>) -> Self {
        Self { orders, events }
    }

    /// Persists a new order with a fresh order number and its initial status.
    #[instrument(skip(self, new), fields(customer_id = %new.customer_id, method = ?new.payment_method))]
    pub async fn create(&self, new: NewOrder) -> Result<Order> {
        let mut order = Order::create(new)?;
        let mut attempt = 1;
        loop {
            match self.orders.insert(&order).await {
                Ok(()) => break,
                Err(EcommerceError::Conflict(reason)) if attempt < CREATE_ATTEMPTS => {
                    warn!(order_id = %order.order_id, %reason, "order number collision, renumbering");
                    order.renumber();
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
        info!(order_id = %order.order_id, status = %order.status, total = %order.total, "order created");
        self.events.publish(OrderEvent::created(&order)).await;
        Ok(order)
    }

    /// Applies `transition` to `order` with a conditional write. A lost race
    /// re-reads the order and re-plans, so concurrent signals resolve to
    /// exactly one applied change.
    #[instrument(skip(self, order), fields(order_id = %order.order_id, from = %order.status))]
    pub async fn transition(&self, order: Order, transition: Transition) -> Result<Transitioned> {
        let mut current = order;
        for _ in 0..TRANSITION_ATTEMPTS {
            let (allowed_from, to) = match current.plan(transition)? {
                TransitionPlan::Unchanged => return Ok(Transitioned { order: current, applied: false }),
                TransitionPlan::Apply { allowed_from, to } => (allowed_from, to),
            };
            if self.orders.update_status(current.id, &allowed_from, to).await? {
                let from = current.status;
                let order = self.orders.find_by_id(current.id).await?;
                info!(order_id = %order.order_id, %from, %to, "order status changed");
                self.events.publish(OrderEvent::status_changed(&order, from)).await;
                return Ok(Transitioned { order, applied: true });
            }
            current = self.orders.find_by_id(current.id).await?;
        }
        Err(EcommerceError::Conflict(format!("order {} is changing concurrently", current.order_id)))
    }

    pub async fn find_by_payment_session_id(&self, session_id: &str) -> Result<Order> {
        self.orders.find_by_payment_session_id(session_id).await
    }

    /// The customer's own order; orders of other customers read as absent.
    pub async fn get_for_customer(&self, customer_id: Uuid, order_id: &OrderNumber) -> Result<Order> {
        let order = self.orders.find_by_order_id(order_id).await?;
        if !order.is_owned_by(customer_id) {
            return Err(EcommerceError::NotFound("order"));
        }
        Ok(order)
    }

    pub async fn list_for_customer(&self, customer_id: Uuid) -> Result<Vec<Order>> {
        self.orders.list_by_customer(customer_id).await
    }

    pub async fn list_all(&self, page: u32, per_page: u32) -> Result<(Vec<Order>, u64)> {
        self.orders.list(page, per_page).await
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, customer_id: Uuid, order_id: &OrderNumber) -> Result<Order> {
        let order = self.get_for_customer(customer_id, order_id).await?;
        Ok(self.transition(order, Transition::Cancel).await?.order)
    }

    /// Administrative override to any enumerated status.
    #[instrument(skip(self))]
    pub async fn set_status(&self, order_id: &OrderNumber, status: OrderStatus) -> Result<Order> {
        let order = self.orders.find_by_order_id(order_id).await?;
        Ok(self.transition(order, Transition::Admin(status)).await?.order)
    }
}
