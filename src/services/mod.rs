pub mod admission;
pub mod atomic_metrics;
pub mod ledger;
pub mod outcome_decoder;
pub mod payment_adapter;
pub mod payment_processor_client;
pub mod payment_service;
pub mod real_time_metrics;
pub mod request_log;

pub use payment_adapter::{PaymentAdapter, PaymentResolution};
pub use payment_processor_client::PaymentProcessorClient;
pub use payment_service::{PaymentService, ServiceError};
