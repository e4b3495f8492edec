pub mod metrics;
pub mod payments;
pub mod payments_summary;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::services::PaymentService;

pub fn router(service: Arc<PaymentService>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/payments", post(payments::create_payment))
        .route("/payments/:payment_id/events", get(payments_summary::get_payment_events))
        .route("/payments-summary", get(payments_summary::get_summary))
        .route("/metrics", get(metrics::get_metrics))
        .with_state(service)
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}
