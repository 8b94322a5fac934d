//! Hosted-checkout payment gateway adapter.

pub mod hosted;
pub mod signature;

use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use hosted::HostedCheckoutClient;
pub use signature::{verify_webhook_signature, WebhookVerifier};

/// One row of the manifest shown on the provider's hosted page.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckoutLineItem {
    pub name: String,
    pub image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HostedSessionRequest {
    pub line_items: Vec<CheckoutLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostedSession {
    pub session_id: String,
    pub redirect_url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPaymentStatus {
    Paid,
    Unpaid,
    Expired,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(String),

    #[error("gateway rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("gateway response malformed: {0}")]
    Malformed(String),

    #[error("gateway call timed out")]
    Timeout,
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() { Self::Timeout } else { Self::Transport(e.to_string()) }
    }
}

impl From<GatewayError> for crate::EcommerceError {
    fn from(e: GatewayError) -> Self { Self::PaymentGateway(e.to_string()) }
}

#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a hosted payment session for the manifest.
    async fn create_hosted_session(&self, request: &HostedSessionRequest) -> Result<HostedSession, GatewayError>;

    /// Live payment status of a session as the provider sees it.
    async fn get_session(&self, session_id: &str) -> Result<SessionPaymentStatus, GatewayError>;

    /// Closes an open session so it can no longer be paid.
    async fn expire_session(&self, session_id: &str) -> Result<(), GatewayError>;
}
