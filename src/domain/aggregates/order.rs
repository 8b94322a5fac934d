//! Order Aggregate
//!
//! An order is a frozen, priced snapshot of a cart plus a status lifecycle.
//! Status changes are planned here and executed by the order service as a
//! guarded update, so concurrent writers cannot lose each other's changes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;
use validator::Validate;

use crate::domain::value_objects::{OrderNumber, Quantity};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_id: OrderNumber,
    pub customer_id: Uuid,
    pub payment_session_id: Option<String>,
    pub shipping_address: ShippingAddress,
    pub contact_email: String,
    pub line_items: Vec<LineItemSnapshot>,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub price: Decimal,
    pub slug: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItemSnapshot {
    pub product: ProductSnapshot,
    pub quantity: Quantity,
    pub line_total: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 56))]
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod { CashOnDelivery, ExternalGateway }

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CashOnDelivery => "CASH_ON_DELIVERY",
            Self::ExternalGateway => "EXTERNAL_GATEWAY",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CASH_ON_DELIVERY" => Ok(Self::CashOnDelivery),
            "EXTERNAL_GATEWAY" => Ok(Self::ExternalGateway),
            other => Err(format!("unknown payment method '{other}'")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Placed,
    Failed,
    Cancelled,
    Shipped,
    Delivered,
    ReturnRequested,
    Returned,
    Refunded,
    ExchangeRequested,
    Exchanged,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 11] = [
        Self::Pending, Self::Placed, Self::Failed, Self::Cancelled, Self::Shipped, Self::Delivered,
        Self::ReturnRequested, Self::Returned, Self::Refunded, Self::ExchangeRequested, Self::Exchanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Placed => "PLACED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::ReturnRequested => "RETURN_REQUESTED",
            Self::Returned => "RETURNED",
            Self::Refunded => "REFUNDED",
            Self::ExchangeRequested => "EXCHANGE_REQUESTED",
            Self::Exchanged => "EXCHANGED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

/// A requested status change, named by who or what asks for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Provider confirmed payment (webhook or session poll).
    ConfirmPayment,
    /// Provider reported the session expired or unpaid.
    FailPayment,
    /// Customer-initiated cancellation.
    Cancel,
    /// Free-form administrative override, checked only against the enumeration.
    Admin(OrderStatus),
}

impl Transition {
    pub fn target(&self) -> OrderStatus {
        match self {
            Self::ConfirmPayment => OrderStatus::Placed,
            Self::FailPayment => OrderStatus::Failed,
            Self::Cancel => OrderStatus::Cancelled,
            Self::Admin(status) => *status,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionPlan {
    /// Write `to`, but only while the stored status is still one of `allowed_from`.
    Apply { allowed_from: Vec<OrderStatus>, to: OrderStatus },
    /// Nothing to write; re-delivered or superseded signal.
    Unchanged,
}

/// Fields fixed at checkout time.
#[derive(Clone, Debug)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub shipping_address: ShippingAddress,
    pub contact_email: String,
    pub line_items: Vec<LineItemSnapshot>,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_session_id: Option<String>,
}

impl Order {
    pub fn create(new: NewOrder) -> Result<Self, OrderError> {
        let status = match (new.payment_method, new.payment_session_id.as_deref()) {
            (PaymentMethod::CashOnDelivery, _) => OrderStatus::Placed,
            (PaymentMethod::ExternalGateway, Some(_)) => OrderStatus::Pending,
            (PaymentMethod::ExternalGateway, None) => return Err(OrderError::MissingPaymentSession),
        };
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            order_id: OrderNumber::generate(now),
            customer_id: new.customer_id,
            payment_session_id: new.payment_session_id,
            shipping_address: new.shipping_address,
            contact_email: new.contact_email,
            line_items: new.line_items,
            total: new.total,
            payment_method: new.payment_method,
            status,
            created_at: now,
            updated_at: now,
        })
    }

    /// Assigns a fresh order number; used when the previous one collided.
    pub fn renumber(&mut self) { self.order_id = OrderNumber::generate(self.created_at); }

    pub fn is_owned_by(&self, customer_id: Uuid) -> bool { self.customer_id == customer_id }

    /// Decides what a transition means from the current status.
    pub fn plan(&self, transition: Transition) -> Result<TransitionPlan, OrderError> {
        let to = transition.target();
        match transition {
            // Payment signals only move an order out of PENDING. Whichever
            // signal lands first wins; later ones are no-ops.
            Transition::ConfirmPayment | Transition::FailPayment => Ok(match self.status {
                OrderStatus::Pending => TransitionPlan::Apply { allowed_from: vec![OrderStatus::Pending], to },
                _ => TransitionPlan::Unchanged,
            }),
            Transition::Cancel => match self.status {
                OrderStatus::Pending | OrderStatus::Placed => Ok(TransitionPlan::Apply {
                    allowed_from: vec![OrderStatus::Pending, OrderStatus::Placed],
                    to,
                }),
                OrderStatus::Cancelled => Err(OrderError::AlreadyInTerminalState(self.status)),
                from => Err(OrderError::InvalidTransition { from, to, reason: "cannot cancel after shipment" }),
            },
            Transition::Admin(_) if self.status == to => Ok(TransitionPlan::Unchanged),
            Transition::Admin(_) => Ok(TransitionPlan::Apply { allowed_from: vec![self.status], to }),
        }
    }

    pub fn apply_status(&mut self, status: OrderStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    InvalidTransition { from: OrderStatus, to: OrderStatus, reason: &'static str },
    AlreadyInTerminalState(OrderStatus),
    MissingPaymentSession,
    UnknownStatus(String),
}
impl std::error::Error for OrderError {}
impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTransition { from, to, reason } => write!(f, "Invalid transition from {from} to {to}: {reason}"),
            Self::AlreadyInTerminalState(status) => write!(f, "Order is already {status}"),
            Self::MissingPaymentSession => write!(f, "Gateway orders require a payment session"),
            Self::UnknownStatus(s) => write!(f, "Unknown order status '{s}'"),
        }
    }
}

impl From<OrderError> for crate::EcommerceError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::InvalidTransition { from, to, reason } => Self::InvalidTransition { from, to, reason },
            OrderError::AlreadyInTerminalState(status) => Self::AlreadyInTerminalState(status),
            OrderError::MissingPaymentSession | OrderError::UnknownStatus(_) => Self::Validation(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_order(method: PaymentMethod, session: Option<&str>) -> NewOrder {
        NewOrder {
            customer_id: Uuid::new_v4(),
            shipping_address: ShippingAddress::default(),
            contact_email: "buyer@example.com".into(),
            line_items: vec![],
            total: Decimal::new(1300, 0),
            payment_method: method,
            payment_session_id: session.map(str::to_string),
        }
    }

    fn order_in(status: OrderStatus) -> Order {
        let mut order = Order::create(new_order(PaymentMethod::ExternalGateway, Some("sess_1"))).unwrap();
        order.status = status;
        order
    }

    #[test]
    fn test_initial_status_follows_payment_method() {
        let cod = Order::create(new_order(PaymentMethod::CashOnDelivery, None)).unwrap();
        assert_eq!(cod.status, OrderStatus::Placed);
        let gateway = Order::create(new_order(PaymentMethod::ExternalGateway, Some("sess_1"))).unwrap();
        assert_eq!(gateway.status, OrderStatus::Pending);
        assert_eq!(
            Order::create(new_order(PaymentMethod::ExternalGateway, None)).unwrap_err(),
            OrderError::MissingPaymentSession
        );
    }

    #[test]
    fn test_payment_signals_only_leave_pending() {
        let pending = order_in(OrderStatus::Pending);
        assert_eq!(
            pending.plan(Transition::ConfirmPayment).unwrap(),
            TransitionPlan::Apply { allowed_from: vec![OrderStatus::Pending], to: OrderStatus::Placed }
        );
        assert_eq!(
            pending.plan(Transition::FailPayment).unwrap(),
            TransitionPlan::Apply { allowed_from: vec![OrderStatus::Pending], to: OrderStatus::Failed }
        );

        let placed = order_in(OrderStatus::Placed);
        assert_eq!(placed.plan(Transition::ConfirmPayment).unwrap(), TransitionPlan::Unchanged);
        assert_eq!(placed.plan(Transition::FailPayment).unwrap(), TransitionPlan::Unchanged);
    }

    #[test]
    fn test_cancel_rules() {
        for status in [OrderStatus::Pending, OrderStatus::Placed] {
            assert!(matches!(order_in(status).plan(Transition::Cancel), Ok(TransitionPlan::Apply { .. })));
        }
        assert_eq!(
            order_in(OrderStatus::Cancelled).plan(Transition::Cancel).unwrap_err(),
            OrderError::AlreadyInTerminalState(OrderStatus::Cancelled)
        );
        for status in [OrderStatus::Shipped, OrderStatus::Delivered, OrderStatus::Failed, OrderStatus::Returned] {
            assert!(matches!(
                order_in(status).plan(Transition::Cancel),
                Err(OrderError::InvalidTransition { to: OrderStatus::Cancelled, .. })
            ));
        }
    }

    #[test]
    fn test_admin_override_is_permissive() {
        let delivered = order_in(OrderStatus::Delivered);
        assert_eq!(
            delivered.plan(Transition::Admin(OrderStatus::Pending)).unwrap(),
            TransitionPlan::Apply { allowed_from: vec![OrderStatus::Delivered], to: OrderStatus::Pending }
        );
        assert_eq!(delivered.plan(Transition::Admin(OrderStatus::Delivered)).unwrap(), TransitionPlan::Unchanged);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("return_requested".parse::<OrderStatus>().unwrap(), OrderStatus::ReturnRequested);
        assert_eq!(" PLACED ".parse::<OrderStatus>().unwrap(), OrderStatus::Placed);
        assert!("LOST".parse::<OrderStatus>().is_err());
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
    }
}
