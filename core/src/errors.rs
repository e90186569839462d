use thiserror::Error;

use crate::record::RawRow;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Data source error: {0}")]
    Source(#[from] SourceError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open source {path}")]
    Open {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to read source header")]
    Header(#[source] csv::Error),

    #[error("Failed to read record {line}")]
    Read {
        line: u64,
        #[source]
        source: csv::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid table name {name:?}: {reason}")]
    InvalidTable { name: String, reason: String },

    #[error("Unsupported database url scheme: {scheme}")]
    UnsupportedDatabase { scheme: String },
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to connect to database: {reason}")]
    Connect {
        reason: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to ensure table {table} exists")]
    Schema {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to write {rows} rows to {table}")]
    Write {
        table: String,
        rows: usize,
        #[source]
        source: sqlx::Error,
    },
}

/// A row that could not be turned into a record. Carries the offending row so
/// the rejection can be logged with its original payload.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("unparseable date: {}", .value.as_deref().unwrap_or("<missing>"))]
    UnparseableDate { value: Option<String>, raw: RawRow },

    #[error("invalid numeric field {field}: {value:?}")]
    InvalidNumeric {
        field: &'static str,
        value: String,
        raw: RawRow,
    },
}

impl ValidationError {
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::UnparseableDate { .. } => "unparseable date",
            ValidationError::InvalidNumeric { .. } => "invalid numeric field",
        }
    }

    pub fn raw(&self) -> &RawRow {
        match self {
            ValidationError::UnparseableDate { raw, .. } => raw,
            ValidationError::InvalidNumeric { raw, .. } => raw,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestionError>;

impl IngestionError {
    /// Name of the failing stage, used as a structured log field.
    pub fn stage(&self) -> &'static str {
        match self {
            IngestionError::Config(_) => "config",
            IngestionError::Source(_) => "source",
            IngestionError::Sink(SinkError::Connect { .. }) => "connect",
            IngestionError::Sink(SinkError::Schema { .. }) => "schema",
            IngestionError::Sink(SinkError::Write { .. }) => "write",
        }
    }
}
