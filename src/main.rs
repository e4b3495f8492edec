use anyhow::Context;
use clap::Parser;
use payment_adapter::app::config::{AccountsFile, Config};
use payment_adapter::handlers;
use payment_adapter::services::ledger::InMemoryLedger;
use payment_adapter::services::payment_processor_client::PaymentProcessorClient;
use payment_adapter::services::request_log::CsvRequestLog;
use payment_adapter::services::{PaymentAdapter, PaymentService};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    let accounts = AccountsFile::load(&config.accounts_path)
        .with_context(|| format!("loading {}", config.accounts_path.display()))?;
    info!(
        "Starting payment adapter on port {} with {} accounts against {}",
        config.server_port,
        accounts.accounts.len(),
        accounts.processor_url
    );

    let max_idle = accounts
        .accounts
        .iter()
        .map(|account| account.parallel_requests as usize)
        .max()
        .unwrap_or(1);
    let transport = Arc::new(PaymentProcessorClient::new(
        &accounts.processor_url,
        accounts.request_timeout(),
        max_idle,
    )?);
    let ledger = Arc::new(InMemoryLedger::new());

    // the writer task finishes on its own once the last adapter is dropped
    let request_log = match &config.request_log {
        Some(path) => Some(CsvRequestLog::create(path)?.0),
        None => None,
    };

    let adapters = accounts
        .accounts
        .iter()
        .map(|account| {
            let gate = accounts.gate.build(account.rate_limit_per_sec);
            let mut adapter = PaymentAdapter::new(
                account.clone(),
                accounts.request_timeout(),
                gate,
                transport.clone(),
                ledger.clone(),
            );
            if let Some(log) = &request_log {
                adapter = adapter.with_observer(Arc::new(log.clone()));
            }
            info!(
                "Account {} ready: {} rps, {} parallel, price {}",
                account.account_name, account.rate_limit_per_sec, account.parallel_requests, account.price
            );
            Arc::new(adapter)
        })
        .collect();

    let service = Arc::new(PaymentService::new(adapters, ledger));
    let app = handlers::router(service);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
