use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{Reader, ReaderBuilder, StringRecord};
use tracing::debug;

use crate::errors::SourceError;
use crate::record::RawRow;
use crate::source::RowSource;

/// Comma-delimited source with a header row.
///
/// Lines may be shorter or longer than the header. Missing trailing cells are
/// left out of the row; cells past the header are dropped.
pub struct CsvSource<R> {
    reader: Reader<R>,
    headers: StringRecord,
    record: StringRecord,
    label: String,
}

impl CsvSource<File> {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let reader = builder()
            .from_path(path)
            .map_err(|source| SourceError::Open {
                path: path.display().to_string(),
                source,
            })?;
        Self::with_reader(reader, path.display().to_string())
    }
}

impl<R: Read> CsvSource<R> {
    pub fn from_reader(rdr: R, label: impl Into<String>) -> Result<Self, SourceError> {
        Self::with_reader(builder().from_reader(rdr), label.into())
    }

    fn with_reader(mut reader: Reader<R>, label: String) -> Result<Self, SourceError> {
        let headers = reader.headers().map_err(SourceError::Header)?.clone();
        debug!(source = %label, columns = headers.len(), "Opened csv source");
        Ok(Self {
            reader,
            headers,
            record: StringRecord::new(),
            label,
        })
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }
}

fn builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.delimiter(b',').has_headers(true).flexible(true);
    builder
}

impl<R: Read> RowSource for CsvSource<R> {
    fn next_row(&mut self) -> Result<Option<RawRow>, SourceError> {
        let has_record = self
            .reader
            .read_record(&mut self.record)
            .map_err(|source| SourceError::Read {
                line: self.reader.position().line(),
                source,
            })?;
        if !has_record {
            return Ok(None);
        }

        let mut row = RawRow::new();
        for (column, value) in self.headers.iter().zip(self.record.iter()) {
            row.push(column, value);
        }
        Ok(Some(row))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
