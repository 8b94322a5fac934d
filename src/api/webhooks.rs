//! Payment-provider webhook endpoint. The body is taken as raw bytes so the
//! signature is checked over exactly what the provider sent.

use axum::{body::Bytes, extract::State, http::HeaderMap, routing::post, Json, Router};
use serde_json::{json, Value};

use super::AppState;
use crate::{payments::signature::SIGNATURE_HEADER, Result};

pub fn routes() -> Router<AppState> {
    Router::new().route("/payments", post(payment_event))
}

async fn payment_event(State(s): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<Value>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    s.reconciler.handle_provider_event(&body, signature).await?;
    Ok(Json(json!({ "received": true })))
}
