use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Lifecycle event appended for a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Submitted {
        transaction_id: Uuid,
        at: DateTime<Utc>,
        #[serde(with = "millis")]
        spent: Duration,
    },
    Resolved {
        transaction_id: Uuid,
        at: DateTime<Utc>,
        success: bool,
        reason: Option<String>,
    },
}

impl LedgerEvent {
    pub fn transaction_id(&self) -> Uuid {
        match self {
            LedgerEvent::Submitted { transaction_id, .. } => *transaction_id,
            LedgerEvent::Resolved { transaction_id, .. } => *transaction_id,
        }
    }
}

/// Append-only record of what happened to each payment. Every call appends;
/// nothing is ever overwritten.
#[async_trait]
pub trait LedgerReporter: Send + Sync {
    async fn record_submission(
        &self,
        payment_id: Uuid,
        transaction_id: Uuid,
        at: DateTime<Utc>,
        spent: Duration,
    ) -> Result<(), LedgerError>;

    async fn record_resolution(
        &self,
        payment_id: Uuid,
        transaction_id: Uuid,
        at: DateTime<Utc>,
        success: bool,
        reason: Option<String>,
    ) -> Result<(), LedgerError>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub payments: u64,
    pub submissions: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Ledger kept in process memory, keyed by payment id.
#[derive(Default)]
pub struct InMemoryLedger {
    events: DashMap<Uuid, Vec<LedgerEvent>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self, payment_id: Uuid) -> Vec<LedgerEvent> {
        self.events
            .get(&payment_id)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> LedgerSummary {
        let mut summary = LedgerSummary::default();
        for entry in self.events.iter() {
            summary.payments += 1;
            for event in entry.value() {
                match event {
                    LedgerEvent::Submitted { .. } => summary.submissions += 1,
                    LedgerEvent::Resolved { success: true, .. } => summary.succeeded += 1,
                    LedgerEvent::Resolved { success: false, .. } => summary.failed += 1,
                }
            }
        }
        summary
    }

    fn append(&self, payment_id: Uuid, event: LedgerEvent) {
        self.events.entry(payment_id).or_default().push(event);
    }
}

#[async_trait]
impl LedgerReporter for InMemoryLedger {
    async fn record_submission(
        &self,
        payment_id: Uuid,
        transaction_id: Uuid,
        at: DateTime<Utc>,
        spent: Duration,
    ) -> Result<(), LedgerError> {
        self.append(
            payment_id,
            LedgerEvent::Submitted {
                transaction_id,
                at,
                spent,
            },
        );
        Ok(())
    }

    async fn record_resolution(
        &self,
        payment_id: Uuid,
        transaction_id: Uuid,
        at: DateTime<Utc>,
        success: bool,
        reason: Option<String>,
    ) -> Result<(), LedgerError> {
        self.append(
            payment_id,
            LedgerEvent::Resolved {
                transaction_id,
                at,
                success,
                reason,
            },
        );
        Ok(())
    }
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}
