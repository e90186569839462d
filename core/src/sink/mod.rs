pub mod sql;

use std::fmt;

use crate::errors::{ConfigError, SinkError};
use crate::record::{RejectedRow, ValidRecord};

const MAX_IDENTIFIER_LEN: usize = 63;

/// Name of a destination table. Always a plain SQL identifier, so it is safe to
/// splice into generated statements.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Table(String);

impl Table {
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        let invalid = |reason: String| ConfigError::InvalidTable {
            name: name.clone(),
            reason,
        };

        let mut chars = name.chars();
        match chars.next() {
            None => return Err(invalid("empty name".to_string())),
            Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
                return Err(invalid(format!("must start with a letter or '_', got {c:?}")));
            }
            Some(_) => {}
        }
        if let Some(c) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
            return Err(invalid(format!("unexpected character {c:?}")));
        }
        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(invalid(format!("longer than {MAX_IDENTIFIER_LEN} characters")));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `Sink` trait defines the contract for any destination store.
///
/// Every call is awaited to completion before the next row is read, so
/// implementations see writes in source order. Each write is committed on its
/// own; nothing spans two calls.
#[allow(async_fn_in_trait)]
pub trait Sink {
    /// Makes sure `table` exists. Called once per run before the first write.
    async fn prepare(&mut self, table: &Table) -> Result<(), SinkError>;

    /// Writes a batch of valid records in one statement and returns how many
    /// were written. An empty batch is a no-op.
    async fn write_records(
        &mut self,
        table: &Table,
        batch: Vec<ValidRecord>,
    ) -> Result<usize, SinkError>;

    /// Appends rejected rows to the error log, preserving batch order.
    async fn write_errors(&mut self, batch: Vec<RejectedRow>) -> Result<(), SinkError>;
}
