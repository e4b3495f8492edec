use crate::app::config::AccountConfig;
use crate::models::payment::{
    Attempt, Outcome, PaymentRequest, ProcessorCall, REQUEST_TIMEOUT_REASON,
};
use crate::services::admission::AdmissionGate;
use crate::services::atomic_metrics::{AtomicMetrics, MetricsSnapshot};
use crate::services::ledger::LedgerReporter;
use crate::services::outcome_decoder::decode_or_fail;
use crate::services::payment_processor_client::{Transport, TransportError};
use crate::services::real_time_metrics::{LatencyStats, RequestObserver, RequestSample};
use crate::utils::time::now_millis;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Why an attempt did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    DeadlineExceeded,
    Decode,
    TransportTimeout,
    Transport,
    Business,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::DeadlineExceeded => "deadline exceeded",
            FailureKind::Decode => "undecodable response",
            FailureKind::TransportTimeout => "transport timeout",
            FailureKind::Transport => "transport error",
            FailureKind::Business => "declined",
        };
        f.write_str(name)
    }
}

/// How a payment's chain of attempts ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentResolution {
    Succeeded { attempts: u32, transaction_id: Uuid },
    DeadlineExceeded { attempts: u32 },
}

impl PaymentResolution {
    pub fn attempts(&self) -> u32 {
        match *self {
            PaymentResolution::Succeeded { attempts, .. } => attempts,
            PaymentResolution::DeadlineExceeded { attempts } => attempts,
        }
    }
}

enum AttemptResult {
    Succeeded,
    Failed(FailureKind),
    Expired,
}

/// Submits payments for a single processor account.
///
/// Each payment runs as a loop of attempts. Every attempt is recorded as
/// submitted before it waits for admission, and as resolved once its outcome is
/// known. A failed attempt is followed by a fresh one until a call succeeds or
/// the deadline passes; the deadline is checked before each attempt and again
/// right before dispatch, so nothing is sent to the processor late.
pub struct PaymentAdapter {
    account: AccountConfig,
    request_timeout: Duration,
    gate: Arc<dyn AdmissionGate>,
    parallel: Semaphore,
    transport: Arc<dyn Transport>,
    ledger: Arc<dyn LedgerReporter>,
    stats: Arc<LatencyStats>,
    observers: Vec<Arc<dyn RequestObserver>>,
    metrics: AtomicMetrics,
}

impl PaymentAdapter {
    pub fn new(
        account: AccountConfig,
        request_timeout: Duration,
        gate: Arc<dyn AdmissionGate>,
        transport: Arc<dyn Transport>,
        ledger: Arc<dyn LedgerReporter>,
    ) -> Self {
        let stats = Arc::new(LatencyStats::default());
        Self {
            parallel: Semaphore::new(account.parallel_requests.max(1) as usize),
            account,
            request_timeout,
            gate,
            transport,
            ledger,
            observers: vec![stats.clone() as Arc<dyn RequestObserver>],
            stats,
            metrics: AtomicMetrics::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn price(&self) -> i64 {
        self.account.price
    }

    pub fn is_enabled(&self) -> bool {
        self.account.enabled
    }

    pub fn name(&self) -> &str {
        &self.account.account_name
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn latency_stats(&self) -> &LatencyStats {
        &self.stats
    }

    /// Starts working on `request` in the background and returns at once.
    pub fn submit(self: &Arc<Self>, request: PaymentRequest) -> JoinHandle<PaymentResolution> {
        let adapter = Arc::clone(self);
        tokio::spawn(async move { adapter.process(request).await })
    }

    /// Runs attempts for `request` until one succeeds or the deadline passes.
    pub async fn process(&self, request: PaymentRequest) -> PaymentResolution {
        info!(
            "[{}] Submitting payment request for payment {}",
            self.name(),
            request.payment_id
        );

        let mut attempts = 0;
        loop {
            if request.is_expired_at(now_millis()) {
                let transaction_id = Uuid::new_v4();
                self.observe(&request, transaction_id, Duration::ZERO, 0);
                self.report_resolution(
                    &request,
                    transaction_id,
                    Outcome::failed(REQUEST_TIMEOUT_REASON),
                )
                .await;
                self.metrics.increment_expired();
                warn!(
                    "[{}] Giving up on payment {} after {} attempts: {}",
                    self.name(),
                    request.payment_id,
                    attempts,
                    FailureKind::DeadlineExceeded
                );
                return PaymentResolution::DeadlineExceeded { attempts };
            }

            attempts += 1;
            let attempt = Attempt::new(attempts);
            match self.attempt(&request, attempt).await {
                AttemptResult::Succeeded => {
                    return PaymentResolution::Succeeded {
                        attempts,
                        transaction_id: attempt.transaction_id,
                    };
                }
                AttemptResult::Expired => {
                    return PaymentResolution::DeadlineExceeded { attempts };
                }
                AttemptResult::Failed(kind) => {
                    info!(
                        "[{}] Retrying payment {} after attempt {} failed: {}",
                        self.name(),
                        request.payment_id,
                        attempt.number,
                        kind
                    );
                }
            }
        }
    }

    async fn attempt(&self, request: &PaymentRequest, attempt: Attempt) -> AttemptResult {
        let transaction_id = attempt.transaction_id;
        info!(
            "[{}] Submit for {} , txId: {}",
            self.name(),
            request.payment_id,
            transaction_id
        );

        // Recorded before admission: the ledger must show the attempt even while
        // it is still waiting for a slot.
        let spent = Duration::from_millis((now_millis() - request.started_at).max(0) as u64);
        self.report_submission(request, transaction_id, spent).await;
        self.metrics.increment_submitted();

        self.gate.acquire().await;
        // never closed
        let permit = self.parallel.acquire().await.ok();

        if request.is_expired_at(now_millis()) {
            drop(permit);
            warn!(
                "[{}] Deadline passed while txId: {} waited for admission, payment: {}",
                self.name(),
                transaction_id,
                request.payment_id
            );
            self.observe(request, transaction_id, Duration::ZERO, 0);
            self.report_resolution(request, transaction_id, Outcome::failed(REQUEST_TIMEOUT_REASON))
                .await;
            self.metrics.increment_expired();
            return AttemptResult::Expired;
        }

        let call = ProcessorCall {
            service_name: self.account.service_name.clone(),
            account_name: self.account.account_name.clone(),
            transaction_id,
            payment_id: request.payment_id,
            amount: request.amount,
            timeout: self.request_timeout,
        };

        let created_at = Instant::now();
        let sent = self.transport.send(&call).await;
        let call_time = created_at.elapsed();
        drop(permit);

        match sent {
            Ok(reply) => {
                let (outcome, malformed) = decode_or_fail(&reply.body);
                let failure = match malformed {
                    Some(e) => {
                        error!(
                            "[{}] [ERROR] Payment processed for txId: {}, payment: {}, result code: {}, reason: {} ({})",
                            self.name(),
                            transaction_id,
                            request.payment_id,
                            reply.status,
                            String::from_utf8_lossy(&reply.body),
                            e
                        );
                        Some(FailureKind::Decode)
                    }
                    None if outcome.success => None,
                    None => Some(FailureKind::Business),
                };

                self.observe(request, transaction_id, call_time, reply.status);
                info!(
                    "[{}] Payment processed for txId: {}, payment: {}, succeeded: {}, message: {:?}",
                    self.name(),
                    transaction_id,
                    request.payment_id,
                    outcome.success,
                    outcome.reason
                );
                self.report_resolution(request, transaction_id, outcome).await;

                match failure {
                    None => {
                        self.metrics.increment_succeeded();
                        AttemptResult::Succeeded
                    }
                    Some(kind) => {
                        self.metrics.increment_failed();
                        AttemptResult::Failed(kind)
                    }
                }
            }
            Err(err) => {
                self.observe(request, transaction_id, call_time, 0);
                let (kind, reason) = match err {
                    TransportError::Timeout => {
                        self.metrics.increment_timed_out();
                        (FailureKind::TransportTimeout, REQUEST_TIMEOUT_REASON.to_string())
                    }
                    TransportError::Other(message) => {
                        self.metrics.increment_failed();
                        (FailureKind::Transport, message)
                    }
                };
                error!(
                    "[{}] Payment failed for txId: {}, payment: {}: {} ({})",
                    self.name(),
                    transaction_id,
                    request.payment_id,
                    reason,
                    kind
                );
                self.report_resolution(request, transaction_id, Outcome::failed(reason))
                    .await;
                AttemptResult::Failed(kind)
            }
        }
    }

    fn observe(&self, request: &PaymentRequest, transaction_id: Uuid, call_time: Duration, status: u16) {
        let sample = RequestSample {
            payment_id: request.payment_id,
            transaction_id,
            call_time,
            status,
        };
        for observer in &self.observers {
            observer.observe(&sample);
        }
    }

    async fn report_submission(&self, request: &PaymentRequest, transaction_id: Uuid, spent: Duration) {
        if let Err(e) = self
            .ledger
            .record_submission(request.payment_id, transaction_id, Utc::now(), spent)
            .await
        {
            error!(
                "[{}] Could not record submission of txId: {}, payment: {}: {}",
                self.name(),
                transaction_id,
                request.payment_id,
                e
            );
        }
    }

    async fn report_resolution(&self, request: &PaymentRequest, transaction_id: Uuid, outcome: Outcome) {
        if let Err(e) = self
            .ledger
            .record_resolution(
                request.payment_id,
                transaction_id,
                Utc::now(),
                outcome.success,
                outcome.reason,
            )
            .await
        {
            error!(
                "[{}] Could not record resolution of txId: {}, payment: {}: {}",
                self.name(),
                transaction_id,
                request.payment_id,
                e
            );
        }
    }
}
