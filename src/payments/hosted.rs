//! HTTP client for a Stripe-Checkout-compatible provider.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{GatewayError, HostedSession, HostedSessionRequest, PaymentGateway, SessionPaymentStatus};
use crate::{config::PaymentConfig, domain::value_objects::to_minor_units};

#[derive(Clone, Debug)]
pub struct HostedCheckoutClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
    status: Option<String>,
    payment_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl HostedCheckoutClient {
    pub fn new(config: &PaymentConfig) -> Result<Self, GatewayError> {
        Self::with_base(config, &config.api_base, config.timeout)
    }

    pub fn with_base(config: &PaymentConfig, api_base: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            currency: config.currency.clone(),
        })
    }

    fn session_form(&self, request: &HostedSessionRequest) -> Result<Vec<(String, String)>, GatewayError> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("customer_email".to_string(), request.customer_email.clone()),
        ];
        for (i, item) in request.line_items.iter().enumerate() {
            let unit_amount = to_minor_units(item.unit_price)
                .ok_or_else(|| GatewayError::Malformed(format!("price {} out of range", item.unit_price)))?;
            let prefix = format!("line_items[{i}]");
            form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
            form.push((format!("{prefix}[price_data][currency]"), self.currency.clone()));
            form.push((format!("{prefix}[price_data][unit_amount]"), unit_amount.to_string()));
            form.push((format!("{prefix}[price_data][product_data][name]"), item.name.clone()));
            if let Some(image) = &item.image {
                form.push((format!("{prefix}[price_data][product_data][images][0]"), image.clone()));
            }
        }
        Ok(form)
    }

    async fn read_session(response: reqwest::Response) -> Result<SessionResponse, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorEnvelope>().await {
                Ok(envelope) => envelope.error.message,
                Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
            };
            return Err(GatewayError::Rejected { status: status.as_u16(), message });
        }
        response.json::<SessionResponse>().await.map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for HostedCheckoutClient {
    async fn create_hosted_session(&self, request: &HostedSessionRequest) -> Result<HostedSession, GatewayError> {
        let form = self.session_form(request)?;
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.api_key)
            .form(&form)
            .send()
            .await?;
        let session = Self::read_session(response).await?;
        let redirect_url = session.url.ok_or_else(|| GatewayError::Malformed("session has no url".into()))?;
        Ok(HostedSession { session_id: session.id, redirect_url })
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionPaymentStatus, GatewayError> {
        let response = self
            .http
            .get(format!("{}/v1/checkout/sessions/{session_id}", self.api_base))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let session = Self::read_session(response).await?;
        Ok(match (session.status.as_deref(), session.payment_status.as_deref()) {
            (Some("expired"), _) => SessionPaymentStatus::Expired,
            (_, Some("paid" | "no_payment_required")) => SessionPaymentStatus::Paid,
            _ => SessionPaymentStatus::Unpaid,
        })
    }

    async fn expire_session(&self, session_id: &str) -> Result<(), GatewayError> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions/{session_id}/expire", self.api_base))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::read_session(response).await.map(|_| ())
    }
}
