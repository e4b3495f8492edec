#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use payment_adapter::app::config::AccountConfig;
use payment_adapter::models::payment::{PaymentRequest, ProcessorCall};
use payment_adapter::services::admission::AdmissionGate;
use payment_adapter::services::ledger::{InMemoryLedger, LedgerError, LedgerEvent, LedgerReporter};
use payment_adapter::services::payment_processor_client::{ProcessorReply, Transport, TransportError};
use payment_adapter::services::PaymentAdapter;
use payment_adapter::utils::time::now_millis;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub fn account(name: &str) -> AccountConfig {
    AccountConfig {
        service_name: "onlineStore".to_string(),
        account_name: name.to_string(),
        rate_limit_per_sec: 100,
        parallel_requests: 10,
        average_processing_time: Duration::from_millis(50),
        price: 10,
        enabled: true,
    }
}

pub fn request_with_deadline_in(ms: i64) -> PaymentRequest {
    let now = now_millis();
    PaymentRequest {
        payment_id: Uuid::new_v4(),
        amount: 100,
        started_at: now,
        deadline: now + ms,
    }
}

pub fn reply(status: u16, body: &str) -> Result<ProcessorReply, TransportError> {
    Ok(ProcessorReply {
        status,
        body: body.as_bytes().to_vec(),
    })
}

pub fn accepted() -> Result<ProcessorReply, TransportError> {
    reply(200, r#"{"result":true,"message":null}"#)
}

pub fn declined(message: &str) -> Result<ProcessorReply, TransportError> {
    reply(200, &format!(r#"{{"result":false,"message":"{message}"}}"#))
}

/// Plays back scripted replies in order; once the script runs out every call
/// gets `fallback`.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<ProcessorReply, TransportError>>>,
    fallback: Result<ProcessorReply, TransportError>,
    calls: Mutex<Vec<ProcessorCall>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<ProcessorReply, TransportError>>) -> Self {
        Self::with_fallback(script, accepted())
    }

    pub fn with_fallback(
        script: Vec<Result<ProcessorReply, TransportError>>,
        fallback: Result<ProcessorReply, TransportError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<ProcessorCall> {
        self.calls.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, call: &ProcessorCall) -> Result<ProcessorReply, TransportError> {
        self.calls.lock().push(call.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Grants every slot, optionally after a delay, and counts acquisitions.
#[derive(Default)]
pub struct CountingGate {
    delay: Duration,
    acquired: AtomicUsize,
}

impl CountingGate {
    pub fn open() -> Self {
        Self::default()
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            acquired: AtomicUsize::new(0),
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdmissionGate for CountingGate {
    async fn acquire(&self) {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// A ledger that rejects every append.
pub struct BrokenLedger;

#[async_trait]
impl LedgerReporter for BrokenLedger {
    async fn record_submission(
        &self,
        _payment_id: Uuid,
        _transaction_id: Uuid,
        _at: DateTime<Utc>,
        _spent: Duration,
    ) -> Result<(), LedgerError> {
        Err(LedgerError::Unavailable("event store down".into()))
    }

    async fn record_resolution(
        &self,
        _payment_id: Uuid,
        _transaction_id: Uuid,
        _at: DateTime<Utc>,
        _success: bool,
        _reason: Option<String>,
    ) -> Result<(), LedgerError> {
        Err(LedgerError::Unavailable("event store down".into()))
    }
}

pub struct Harness {
    pub adapter: Arc<PaymentAdapter>,
    pub transport: Arc<ScriptedTransport>,
    pub gate: Arc<CountingGate>,
    pub ledger: Arc<InMemoryLedger>,
}

pub fn harness(transport: ScriptedTransport, gate: CountingGate) -> Harness {
    harness_for(account("acc-test"), transport, gate)
}

pub fn harness_for(account: AccountConfig, transport: ScriptedTransport, gate: CountingGate) -> Harness {
    let transport = Arc::new(transport);
    let gate = Arc::new(gate);
    let ledger = Arc::new(InMemoryLedger::new());
    let adapter = Arc::new(PaymentAdapter::new(
        account,
        Duration::from_secs(1),
        gate.clone(),
        transport.clone(),
        ledger.clone(),
    ));
    Harness {
        adapter,
        transport,
        gate,
        ledger,
    }
}

pub fn submissions(events: &[LedgerEvent]) -> Vec<Uuid> {
    events
        .iter()
        .filter_map(|event| match event {
            LedgerEvent::Submitted { transaction_id, .. } => Some(*transaction_id),
            _ => None,
        })
        .collect()
}

pub fn resolutions(events: &[LedgerEvent]) -> Vec<(Uuid, bool, Option<String>)> {
    events
        .iter()
        .filter_map(|event| match event {
            LedgerEvent::Resolved {
                transaction_id,
                success,
                reason,
                ..
            } => Some((*transaction_id, *success, reason.clone())),
            _ => None,
        })
        .collect()
}

/// Every submitted transaction is resolved exactly once, after its submission.
pub fn assert_paired(events: &[LedgerEvent]) {
    for (index, event) in events.iter().enumerate() {
        if let LedgerEvent::Submitted { transaction_id, .. } = event {
            let later: Vec<_> = events[index + 1..]
                .iter()
                .filter(|e| matches!(e, LedgerEvent::Resolved { .. }) && e.transaction_id() == *transaction_id)
                .collect();
            assert_eq!(later.len(), 1, "txId {transaction_id} must be resolved once after submission");
            let earlier = events[..index]
                .iter()
                .any(|e| e.transaction_id() == *transaction_id);
            assert!(!earlier, "txId {transaction_id} seen before its submission");
        }
    }
}
