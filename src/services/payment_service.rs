use crate::models::payment::PaymentRequest;
use crate::services::atomic_metrics::MetricsSnapshot;
use crate::services::ledger::{InMemoryLedger, LedgerSummary};
use crate::services::payment_adapter::{PaymentAdapter, PaymentResolution};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no enabled account available")]
    NoAccountAvailable,
}

#[derive(Debug, Serialize)]
pub struct AccountStatus {
    pub account: String,
    pub enabled: bool,
    pub price: i64,
    pub p95_latency_ms: u64,
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
}

/// Routes payments to the cheapest enabled account.
pub struct PaymentService {
    adapters: Vec<Arc<PaymentAdapter>>,
    ledger: Arc<InMemoryLedger>,
}

impl PaymentService {
    pub fn new(adapters: Vec<Arc<PaymentAdapter>>, ledger: Arc<InMemoryLedger>) -> Self {
        Self { adapters, ledger }
    }

    pub fn select_account(&self) -> Option<&Arc<PaymentAdapter>> {
        self.adapters
            .iter()
            .filter(|adapter| adapter.is_enabled())
            .min_by_key(|adapter| adapter.price())
    }

    pub fn submit_payment(
        &self,
        request: PaymentRequest,
    ) -> Result<JoinHandle<PaymentResolution>, ServiceError> {
        let Some(adapter) = self.select_account() else {
            warn!("No enabled account for payment {}", request.payment_id);
            return Err(ServiceError::NoAccountAvailable);
        };

        info!("Routing payment {} to {}", request.payment_id, adapter.name());
        Ok(adapter.submit(request))
    }

    pub fn ledger(&self) -> &InMemoryLedger {
        &self.ledger
    }

    pub fn summary(&self) -> LedgerSummary {
        self.ledger.summary()
    }

    pub fn account_statuses(&self) -> Vec<AccountStatus> {
        self.adapters
            .iter()
            .map(|adapter| AccountStatus {
                account: adapter.name().to_string(),
                enabled: adapter.is_enabled(),
                price: adapter.price(),
                p95_latency_ms: adapter.latency_stats().p95().as_millis() as u64,
                counters: adapter.metrics(),
            })
            .collect()
    }
}
