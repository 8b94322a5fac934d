//! Payment reconciliation: provider webhooks and client-side session polling.
//!
//! Both entry points move an order out of `PENDING` through
//! [`OrderService::transition`], so whichever arrives first wins and the other
//! becomes a no-op.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    domain::aggregates::{Order, Transition},
    payments::{PaymentGateway, SessionPaymentStatus, WebhookVerifier},
    services::{checkout::bounded, orders::OrderService},
    EcommerceError, Result,
};

/// What the webhook handler did with a verified event. The provider sees a
/// success response for every variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookAck {
    Applied,
    /// Recognised event that changed nothing (re-delivery, superseded signal).
    Unchanged,
    /// Unrecognised event type.
    Skipped,
    /// Recognised event that could not be processed; logged.
    Ignored,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionStatusView {
    pub paid: bool,
    pub order: Order,
}

#[derive(Debug, Deserialize)]
struct ProviderEvent {
    #[serde(rename = "type")]
    kind: String,
    data: ProviderEventData,
}

#[derive(Debug, Deserialize)]
struct ProviderEventData {
    object: ProviderSession,
}

#[derive(Debug, Deserialize)]
struct ProviderSession {
    id: String,
}

fn transition_for(kind: &str) -> Option<Transition> {
    match kind.strip_prefix("checkout.").unwrap_or(kind) {
        "session.completed" => Some(Transition::ConfirmPayment),
        "session.expired" => Some(Transition::FailPayment),
        _ => None,
    }
}

#[derive(Clone)]
pub struct Reconciler {
    orders: OrderService,
    gateway: Arc<dyn PaymentGateway>,
    verifier: WebhookVerifier,
    gateway_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        orders: OrderService,
        gateway: Arc<dyn PaymentGateway>,
        verifier: WebhookVerifier,
        gateway_timeout: Duration,
    ) -> Self {
        Self { orders, gateway, verifier, gateway_timeout }
    }

    /// Handles a raw provider event. Only a bad signature is an error; once
    /// the payload is authentic every outcome is acknowledged so the provider
    /// stops redelivering.
    #[instrument(skip_all, fields(bytes = payload.len()))]
    pub async fn handle_provider_event(&self, payload: &[u8], signature: Option<&str>) -> Result<WebhookAck> {
        match signature {
            Some(signature) if self.verifier.verify(payload, signature) => {}
            _ => {
                warn!("webhook rejected: signature missing or invalid");
                return Err(EcommerceError::InvalidSignature);
            }
        }

        let event: ProviderEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "signed webhook payload is not a recognisable event");
                return Ok(WebhookAck::Ignored);
            }
        };

        let Some(transition) = transition_for(&event.kind) else {
            debug!(event_type = %event.kind, "webhook event type not handled");
            return Ok(WebhookAck::Skipped);
        };

        let session_id = event.data.object.id;
        let order = match self.orders.find_by_payment_session_id(&session_id).await {
            Ok(order) => order,
            Err(EcommerceError::NotFound(_)) => {
                warn!(event_type = %event.kind, %session_id, "webhook for unknown payment session");
                return Ok(WebhookAck::Ignored);
            }
            Err(e) => {
                error!(event_type = %event.kind, %session_id, error = %e, "order lookup failed for webhook");
                return Ok(WebhookAck::Ignored);
            }
        };

        match self.orders.transition(order, transition).await {
            Ok(result) if result.applied => {
                info!(event_type = %event.kind, %session_id, status = %result.order.status, "webhook applied");
                Ok(WebhookAck::Applied)
            }
            Ok(result) => {
                debug!(event_type = %event.kind, %session_id, status = %result.order.status, "webhook already reconciled");
                Ok(WebhookAck::Unchanged)
            }
            Err(e) => {
                error!(event_type = %event.kind, %session_id, error = %e, "webhook transition failed");
                Ok(WebhookAck::Ignored)
            }
        }
    }

    /// Asks the provider for the live session status and reconciles the
    /// customer's order with it.
    #[instrument(skip(self))]
    pub async fn check_session_status(&self, customer_id: Uuid, session_id: &str) -> Result<SessionStatusView> {
        let order = self.orders.find_by_payment_session_id(session_id).await?;
        if !order.is_owned_by(customer_id) {
            return Err(EcommerceError::NotFound("order"));
        }

        let status = bounded(self.gateway_timeout, self.gateway.get_session(session_id)).await?;
        let transition = match status {
            SessionPaymentStatus::Paid => Transition::ConfirmPayment,
            SessionPaymentStatus::Unpaid | SessionPaymentStatus::Expired => Transition::FailPayment,
        };
        let result = self.orders.transition(order, transition).await?;

        // A failed order must not keep a payable session behind it.
        if result.applied && status == SessionPaymentStatus::Unpaid {
            if let Err(e) = bounded(self.gateway_timeout, self.gateway.expire_session(session_id)).await {
                error!(%session_id, order_id = %result.order.order_id, error = %e, "could not expire unpaid session");
            }
        }
        Ok(SessionStatusView { paid: status == SessionPaymentStatus::Paid, order: result.order })
    }
}
