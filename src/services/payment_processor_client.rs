use crate::models::payment::ProcessorCall;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Raw answer from the processor; status and body are handed to the decoder
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorReply {
    pub status: u16,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, call: &ProcessorCall) -> Result<ProcessorReply, TransportError>;
}

/// Sends process calls to the external payment processor over HTTP.
pub struct PaymentProcessorClient {
    client: Client,
    endpoint: String,
}

impl PaymentProcessorClient {
    pub fn new(processor_url: &str, connect_timeout: Duration, max_idle: usize) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(max_idle)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/external/process", processor_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Transport for PaymentProcessorClient {
    async fn send(&self, call: &ProcessorCall) -> Result<ProcessorReply, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&call.query_pairs())
            .timeout(call.timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        debug!("Processor replied {} for txId: {}", status, call.transaction_id);

        Ok(ProcessorReply { status, body })
    }
}
