use axum::{extract::State, http::StatusCode, response::Json};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::payment::PaymentRequest;
use crate::services::{PaymentService, ServiceError};
use crate::utils::time::now_millis;

const DEFAULT_TTL_MS: i64 = 80_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayment {
    #[serde(default)]
    pub payment_id: Option<Uuid>,
    pub amount: i64,
    #[serde(default)]
    pub ttl_ms: Option<i64>,
}

pub async fn create_payment(
    State(service): State<Arc<PaymentService>>,
    Json(payload): Json<CreatePayment>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    if payload.amount <= 0 {
        error!("Invalid payment amount: {}", payload.amount);
        return Err(StatusCode::BAD_REQUEST);
    }

    let started_at = now_millis();
    let ttl_ms = payload.ttl_ms.unwrap_or(DEFAULT_TTL_MS).max(0);
    let Some(deadline) = started_at.checked_add(ttl_ms) else {
        error!("Payment ttl out of range: {}", ttl_ms);
        return Err(StatusCode::BAD_REQUEST);
    };
    let request = PaymentRequest {
        payment_id: payload.payment_id.unwrap_or_else(Uuid::new_v4),
        amount: payload.amount,
        started_at,
        deadline,
    };

    info!("Received payment request: {}", request.payment_id);

    match service.submit_payment(request) {
        // the attempt loop runs detached; outcomes only go to the ledger
        Ok(_) => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "paymentId": request.payment_id,
                "deadline": request.deadline,
            })),
        )),
        Err(ServiceError::NoAccountAvailable) => {
            error!("No account available for payment {}", request.payment_id);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
