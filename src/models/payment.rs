use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Reason recorded whenever an attempt runs out of time, either at the
/// deadline check or because the processor call itself timed out.
pub const REQUEST_TIMEOUT_REASON: &str = "Request timeout.";

/// A payment the caller wants resolved before `deadline`.
///
/// Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub payment_id: Uuid,
    pub amount: i64,
    pub started_at: i64,
    pub deadline: i64,
}

impl PaymentRequest {
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.deadline
    }
}

/// One transaction-scoped try at resolving a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub transaction_id: Uuid,
    pub number: u32,
}

impl Attempt {
    pub fn new(number: u32) -> Self {
        Self {
            transaction_id: Uuid::new_v4(),
            number,
        }
    }
}

/// Verdict for a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub reason: Option<String>,
}

impl Outcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
        }
    }
}

/// Body returned by the payment processor.
///
/// `result` is mandatory: a body without it is not a valid answer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorResponse {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_id: Option<String>,
    pub result: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Query parameters for one call to the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorCall {
    pub service_name: String,
    pub account_name: String,
    pub transaction_id: Uuid,
    pub payment_id: Uuid,
    pub amount: i64,
    pub timeout: Duration,
}

impl ProcessorCall {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("serviceName", self.service_name.clone()),
            ("accountName", self.account_name.clone()),
            ("transactionId", self.transaction_id.to_string()),
            ("paymentId", self.payment_id.to_string()),
            ("amount", self.amount.to_string()),
            ("timeout", iso_duration(self.timeout)),
        ]
    }
}

/// Formats a duration the way the processor expects it, e.g. `PT20S` or `PT1.5S`.
pub fn iso_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();
    if millis == 0 {
        return format!("PT{}S", secs);
    }
    let fraction = format!("{:03}", millis);
    format!("PT{}.{}S", secs, fraction.trim_end_matches('0'))
}
