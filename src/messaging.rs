//! Order event publication.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::events::OrderEvent;

/// Fire-and-forget sink for order events. Implementations log their own
/// failures; publishing never fails the caller.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: OrderEvent);
}

#[derive(Clone, Debug, Default)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, event: OrderEvent) {
        debug!(order_id = %event.order_id(), event = event.name(), "order event dropped (no publisher)");
    }
}

#[derive(Clone, Debug)]
pub struct NatsPublisher {
    client: async_nats::Client,
    subject_prefix: String,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client, subject_prefix: "ecommerce.orders".to_string() }
    }

    pub fn subject_for(&self, event: &OrderEvent) -> String {
        format!("{}.{}", self.subject_prefix, event.name())
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: OrderEvent) {
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(order_id = %event.order_id(), error = %e, "failed to encode order event");
                return;
            }
        };
        let subject = self.subject_for(&event);
        if let Err(e) = self.client.publish(subject.clone(), payload.into()).await {
            warn!(order_id = %event.order_id(), %subject, error = %e, "failed to publish order event");
        }
    }
}
