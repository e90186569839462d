//! Streaming validate-batch-persist pipeline for daily price bars.
//!
//! Rows are read from a [`source::RowSource`], checked by [`record::validate`],
//! buffered in two [`batch::Accumulator`]s and flushed to a [`sink::Sink`].

pub mod batch;
pub mod config;
pub mod errors;
pub mod ingestor;
pub mod record;
pub mod sink;
pub mod source;
pub mod telemetry;

pub use config::IngestConfig;
pub use errors::{IngestionError, Result};
pub use ingestor::Ingestor;
pub use sink::Table;
pub use sink::sql::SqlSink;
