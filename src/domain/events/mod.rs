//! Domain events
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderStatus, PaymentMethod};
use crate::domain::value_objects::OrderNumber;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created {
        order_id: OrderNumber,
        customer_id: Uuid,
        status: OrderStatus,
        payment_method: PaymentMethod,
        total: Decimal,
        at: DateTime<Utc>,
    },
    StatusChanged {
        order_id: OrderNumber,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    },
}

impl OrderEvent {
    pub fn created(order: &Order) -> Self {
        Self::Created {
            order_id: order.order_id.clone(),
            customer_id: order.customer_id,
            status: order.status,
            payment_method: order.payment_method,
            total: order.total,
            at: order.created_at,
        }
    }

    pub fn status_changed(order: &Order, from: OrderStatus) -> Self {
        Self::StatusChanged { order_id: order.order_id.clone(), from, to: order.status, at: order.updated_at }
    }

    /// Subject suffix used when publishing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::StatusChanged { .. } => "status_changed",
        }
    }

    pub fn order_id(&self) -> &OrderNumber {
        match self {
            Self::Created { order_id, .. } | Self::StatusChanged { order_id, .. } => order_id,
        }
    }
}
