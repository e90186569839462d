use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bars_loader=info,bars_ingest_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Running totals for one ingestion run.
///
/// `valid_count` and `error_count` only move when a batch is flushed, so they
/// always reflect what has been committed.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct IngestMetrics {
    pub rows_read: usize,
    pub valid_count: usize,
    pub error_count: usize,
    pub record_batches: usize,
    pub error_batches: usize,
}

impl IngestMetrics {
    pub fn record_flushed(&mut self, written: usize) {
        self.valid_count += written;
        self.record_batches += 1;
    }

    pub fn errors_flushed(&mut self, written: usize) {
        self.error_count += written;
        self.error_batches += 1;
    }

    pub fn total_written(&self) -> usize {
        self.valid_count + self.error_count
    }
}
