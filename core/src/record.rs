//! Row model and validation.
//!
//! A [`RawRow`] is what the source reader hands over: header-keyed string
//! cells, possibly with columns missing. [`validate`] turns it into a
//! [`ValidRecord`] or a [`ValidationError`]; the driver turns the latter into a
//! [`RejectedRow`] for the error log.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::errors::ValidationError;

/// Header-keyed cells of one source line, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.cells.push((column.into(), value.into()));
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Value under the first alias present in the row.
    pub fn lookup(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|alias| self.get(alias))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl fmt::Display for RawRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.cells.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value:?}")?;
        }
        f.write_str("}")
    }
}

/// Source column aliases for each target field. First present alias wins.
pub const DATE_COLUMNS: &[&str] = &["Date", "date"];
pub const SYMBOL_COLUMNS: &[&str] = &["Symbol", "symbol"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    AdjClose,
    Close,
    High,
    Low,
    Open,
    Volume,
}

impl NumericField {
    pub const ALL: [NumericField; 6] = [
        NumericField::AdjClose,
        NumericField::Close,
        NumericField::High,
        NumericField::Low,
        NumericField::Open,
        NumericField::Volume,
    ];

    /// Target column name.
    pub fn name(self) -> &'static str {
        match self {
            NumericField::AdjClose => "adj_close",
            NumericField::Close => "close",
            NumericField::High => "high",
            NumericField::Low => "low",
            NumericField::Open => "open",
            NumericField::Volume => "volume",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            NumericField::AdjClose => &["Adj Close", "adj_close"],
            NumericField::Close => &["Close", "close"],
            NumericField::High => &["High", "high"],
            NumericField::Low => &["Low", "low"],
            NumericField::Open => &["Open", "open"],
            NumericField::Volume => &["Volume", "volume"],
        }
    }
}

/// A normalized daily bar.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRecord {
    pub date: NaiveDate,
    pub symbol: Option<String>,
    pub adj_close: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub volume: f64,
}

impl ValidRecord {
    pub fn get(&self, field: NumericField) -> f64 {
        match field {
            NumericField::AdjClose => self.adj_close,
            NumericField::Close => self.close,
            NumericField::High => self.high,
            NumericField::Low => self.low,
            NumericField::Open => self.open,
            NumericField::Volume => self.volume,
        }
    }
}

/// A row that failed validation, as it is written to the error log.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    pub launch_timestamp: DateTime<Utc>,
    pub date: Option<String>,
    pub symbol: Option<String>,
    pub message: String,
}

impl RejectedRow {
    pub fn from_error(error: &ValidationError, launch_timestamp: DateTime<Utc>) -> Self {
        let raw = error.raw();
        Self {
            launch_timestamp,
            date: raw.lookup(DATE_COLUMNS).map(str::to_string),
            symbol: raw.lookup(SYMBOL_COLUMNS).map(str::to_string),
            message: format!("{error}: {raw}"),
        }
    }
}

/// Validates one source row. Never touches `raw` and performs no I/O.
pub fn validate(raw: &RawRow) -> Result<ValidRecord, ValidationError> {
    let date_value = raw.lookup(DATE_COLUMNS);
    let date = date_value
        .and_then(parse_date)
        .ok_or_else(|| ValidationError::UnparseableDate {
            value: date_value.map(str::to_string),
            raw: raw.clone(),
        })?;

    let numeric = |field: NumericField| parse_numeric(raw, field);

    Ok(ValidRecord {
        date,
        symbol: raw.lookup(SYMBOL_COLUMNS).map(str::to_string),
        adj_close: numeric(NumericField::AdjClose)?,
        close: numeric(NumericField::Close)?,
        high: numeric(NumericField::High)?,
        low: numeric(NumericField::Low)?,
        open: numeric(NumericField::Open)?,
        volume: numeric(NumericField::Volume)?,
    })
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses the date forms accepted in the `Date` column.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

fn parse_numeric(raw: &RawRow, field: NumericField) -> Result<f64, ValidationError> {
    let value = match raw.lookup(field.columns()).map(str::trim) {
        None | Some("") => return Ok(0.0),
        Some(value) => value,
    };

    match value.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(parsed),
        _ => Err(ValidationError::InvalidNumeric {
            field: field.name(),
            value: value.to_string(),
            raw: raw.clone(),
        }),
    }
}
