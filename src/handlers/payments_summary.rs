use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::services::ledger::{LedgerEvent, LedgerSummary};
use crate::services::PaymentService;

pub async fn get_summary(State(service): State<Arc<PaymentService>>) -> Json<LedgerSummary> {
    info!("Getting payments summary");
    Json(service.summary())
}

pub async fn get_payment_events(
    State(service): State<Arc<PaymentService>>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Vec<LedgerEvent>>, StatusCode> {
    let events = service.ledger().events(payment_id);
    if events.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(events))
}
