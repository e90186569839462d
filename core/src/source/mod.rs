pub mod csv_file;

use crate::errors::SourceError;
use crate::record::RawRow;

pub use self::csv_file::CsvSource;

/// A stream of raw rows, regardless of whether it comes from a file, stdin or
/// an in-memory buffer.
pub trait RowSource {
    /// Returns the next row, or `None` once the stream is exhausted.
    ///
    /// An `Err` means the stream itself is broken and the run cannot go on.
    /// Malformed *content* is not an error here; that is the validator's job.
    fn next_row(&mut self) -> Result<Option<RawRow>, SourceError>;

    /// Short label for logs.
    fn describe(&self) -> String;
}
