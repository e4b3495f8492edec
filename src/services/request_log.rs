use crate::services::real_time_metrics::{RequestObserver, RequestSample};
use crate::utils::time::now_millis;
use serde::Serialize;
use std::path::Path;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct RequestRow {
    logged_at: i64,
    payment_id: Uuid,
    transaction_id: Uuid,
    call_time_ms: u64,
    status: u16,
}

/// Appends every request sample to a CSV file.
///
/// Rows are queued and written from a blocking task, so observing never waits
/// on the disk. Dropping every clone of the log closes the queue; the writer
/// flushes and its handle completes.
#[derive(Clone)]
pub struct CsvRequestLog {
    sender: UnboundedSender<RequestRow>,
}

impl CsvRequestLog {
    pub fn create(path: impl AsRef<Path>) -> Result<(Self, JoinHandle<()>), csv::Error> {
        let path = path.as_ref().to_path_buf();
        let writer = csv::Writer::from_path(&path)?;
        let (sender, receiver) = mpsc::unbounded_channel();

        info!("Writing request log to {}", path.display());
        let handle = tokio::task::spawn_blocking(move || write_rows(writer, receiver));

        Ok((Self { sender }, handle))
    }
}

fn write_rows(mut writer: csv::Writer<std::fs::File>, mut receiver: UnboundedReceiver<RequestRow>) {
    while let Some(row) = receiver.blocking_recv() {
        if let Err(e) = writer.serialize(&row) {
            error!("Failed to write request log row: {}", e);
        }
    }
    if let Err(e) = writer.flush() {
        error!("Failed to flush request log: {}", e);
    }
}

impl RequestObserver for CsvRequestLog {
    fn observe(&self, sample: &RequestSample) {
        let row = RequestRow {
            logged_at: now_millis(),
            payment_id: sample.payment_id,
            transaction_id: sample.transaction_id,
            call_time_ms: sample.call_time.as_millis() as u64,
            status: sample.status,
        };
        // writer gone means shutdown; dropping the row is fine
        let _ = self.sender.send(row);
    }
}
