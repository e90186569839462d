use chrono::Utc;
use tracing::{debug, info, warn};

use crate::batch::{Accumulator, MAX_RECORD_BATCH_SIZE};
use crate::config::{LoadConfig, ProcessingConfig};
use crate::errors::{self, SinkError};
use crate::record::{RejectedRow, ValidRecord, validate};
use crate::sink::{Sink, Table};
use crate::source::{CsvSource, RowSource};
use crate::telemetry::IngestMetrics;

/// The ingestor orchestrates the data flow from source -> validator -> sink.
pub struct Ingestor<S: Sink> {
    sink: S,
    processing: ProcessingConfig,
}

impl<S: Sink> Ingestor<S> {
    /// Record batches larger than `MAX_RECORD_BATCH_SIZE` are capped to it.
    pub fn new(sink: S, mut processing: ProcessingConfig) -> Self {
        if processing.record_batch_size > MAX_RECORD_BATCH_SIZE {
            warn!(
                requested = processing.record_batch_size,
                max = MAX_RECORD_BATCH_SIZE,
                "Record batch size capped"
            );
            processing.record_batch_size = MAX_RECORD_BATCH_SIZE;
        }
        Self { sink, processing }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Opens the load's csv file and runs it into the load's table.
    pub async fn run_load(&mut self, load: &LoadConfig) -> errors::Result<IngestMetrics> {
        let table = Table::new(load.table.as_str())?;
        let mut source = CsvSource::from_path(&load.path)?;
        info!(load = %load.name, path = %load.path.display(), "Starting load");
        self.run(&mut source, &table).await
    }

    /// Streams every row of `source` into `table`.
    ///
    /// High-level logic:
    /// 1. Stamp the run with a single launch timestamp.
    /// 2. Make sure the destination table exists.
    /// 3. Validate each row; valid records and rejections go to separate
    ///    buffers, each flushed to the sink as soon as it is full.
    /// 4. At end of stream flush whatever is left in both buffers.
    ///
    /// A sink or source failure aborts the run. Batches already flushed stay
    /// committed; whatever was still buffered is lost.
    pub async fn run<R: RowSource>(
        &mut self,
        source: &mut R,
        table: &Table,
    ) -> errors::Result<IngestMetrics> {
        let launch_timestamp = Utc::now();
        info!(
            source = %source.describe(),
            table = %table,
            %launch_timestamp,
            "Ingestion run started"
        );

        self.sink.prepare(table).await?;

        let mut records = Accumulator::with_threshold(self.processing.record_batch_size);
        let mut rejected = Accumulator::with_threshold(self.processing.error_batch_size);
        let mut metrics = IngestMetrics::default();

        while let Some(raw) = source.next_row()? {
            metrics.rows_read += 1;

            match validate(&raw) {
                Ok(record) => {
                    if records.add(record) {
                        self.flush_records(table, &mut records, &mut metrics).await?;
                    }
                }
                Err(err) => {
                    debug!(row = metrics.rows_read, reason = err.reason(), "Rejected row");
                    if rejected.add(RejectedRow::from_error(&err, launch_timestamp)) {
                        self.flush_errors(&mut rejected, &mut metrics).await?;
                    }
                }
            }

            debug!(
                rows_read = metrics.rows_read,
                valid_count = metrics.valid_count,
                error_count = metrics.error_count,
                "Progress"
            );
        }

        self.flush_errors(&mut rejected, &mut metrics).await?;
        self.flush_records(table, &mut records, &mut metrics).await?;

        info!(
            table = %table,
            rows_read = metrics.rows_read,
            valid_count = metrics.valid_count,
            error_count = metrics.error_count,
            "Ingestion run finished"
        );
        Ok(metrics)
    }

    async fn flush_records(
        &mut self,
        table: &Table,
        records: &mut Accumulator<ValidRecord>,
        metrics: &mut IngestMetrics,
    ) -> Result<(), SinkError> {
        let batch = records.drain();
        if batch.is_empty() {
            return Ok(());
        }

        let written = self.sink.write_records(table, batch).await?;
        metrics.record_flushed(written);
        info!(
            table = %table,
            batch = written,
            valid_count = metrics.valid_count,
            "Inserted records"
        );
        Ok(())
    }

    async fn flush_errors(
        &mut self,
        rejected: &mut Accumulator<RejectedRow>,
        metrics: &mut IngestMetrics,
    ) -> Result<(), SinkError> {
        let batch = rejected.drain();
        if batch.is_empty() {
            return Ok(());
        }

        let written = batch.len();
        self.sink.write_errors(batch).await?;
        metrics.errors_flushed(written);
        info!(
            batch = written,
            error_count = metrics.error_count,
            "Inserted error rows"
        );
        Ok(())
    }
}
