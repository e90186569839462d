use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime};
use sqlx::{Any, AnyPool};
use sqlx::any::{AnyPoolOptions, install_default_drivers};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::errors::{self, ConfigError, SinkError};
use crate::record::{NumericField, RejectedRow, ValidRecord, parse_date};
use crate::sink::{Sink, Table};

/// Textual form of `date` in the destination tables.
pub const RECORD_DATE_FORMAT: &str = "%Y/%m/%d";
const LAUNCH_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const ERROR_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// SQL backends the sink can generate statements for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .unwrap_or_default();
        match scheme.as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(ConfigError::UnsupportedDatabase { scheme }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Bind placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
        }
    }

    pub fn quote_identifier(self, name: &str) -> String {
        format!("\"{name}\"")
    }

    fn serial_primary_key(self) -> &'static str {
        match self {
            Dialect::Postgres => "SERIAL PRIMARY KEY",
            Dialect::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }

    /// Placeholder for a text parameter stored into a timestamp column.
    fn timestamp_placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("CAST({} AS TIMESTAMP)", self.placeholder(index)),
            Dialect::Sqlite => self.placeholder(index),
        }
    }

    pub fn bars_table_ddl(self, table: &Table) -> String {
        let mut columns = vec![
            format!("id {}", self.serial_primary_key()),
            format!("{} TEXT", self.quote_identifier("date")),
            format!("{} TEXT", self.quote_identifier("symbol")),
        ];
        columns.extend(
            NumericField::ALL
                .iter()
                .map(|f| format!("{} TEXT", self.quote_identifier(f.name()))),
        );
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.quote_identifier(table.as_str()),
            columns.join(", ")
        )
    }

    pub fn error_table_ddl(self, table: &Table) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (id {}, {} TIMESTAMP NULL, {} TEXT, {} TEXT, {} TEXT)",
            self.quote_identifier(table.as_str()),
            self.serial_primary_key(),
            self.quote_identifier("date"),
            self.quote_identifier("launch_timestamp"),
            self.quote_identifier("symbol"),
            self.quote_identifier("message"),
        )
    }

    /// Multi-row insert for `rows` records, parameters numbered row by row.
    pub fn insert_records_sql(self, table: &Table, rows: usize) -> String {
        let columns: Vec<String> = ["date", "symbol"]
            .into_iter()
            .chain(NumericField::ALL.iter().map(|f| f.name()))
            .map(|c| self.quote_identifier(c))
            .collect();
        let width = columns.len();

        let values: Vec<String> = (0..rows)
            .map(|row| {
                let params: Vec<String> = (1..=width)
                    .map(|col| self.placeholder(row * width + col))
                    .collect();
                format!("({})", params.join(", "))
            })
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.quote_identifier(table.as_str()),
            columns.join(", "),
            values.join(", ")
        )
    }

    pub fn insert_error_sql(self, table: &Table) -> String {
        format!(
            "INSERT INTO {} ({}, {}, {}, {}) VALUES ({}, {}, {}, {})",
            self.quote_identifier(table.as_str()),
            self.quote_identifier("date"),
            self.quote_identifier("launch_timestamp"),
            self.quote_identifier("symbol"),
            self.quote_identifier("message"),
            self.timestamp_placeholder(1),
            self.placeholder(2),
            self.placeholder(3),
            self.placeholder(4),
        )
    }
}

/// Text stored for a numeric field. Whole numbers keep a trailing `.0`.
pub fn numeric_text(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Best-effort timestamp for the error log's `date` column. Raw values that do
/// not parse are stored as NULL; the message still carries them.
fn error_date(raw: Option<&str>) -> Option<String> {
    raw.and_then(parse_date)
        .map(|date: NaiveDate| date.and_time(NaiveTime::MIN))
        .map(|ts| ts.format(ERROR_DATE_FORMAT).to_string())
}

/// Relational sink on top of an `sqlx` any-driver pool.
pub struct SqlSink {
    pool: AnyPool,
    dialect: Dialect,
    error_table: Table,
    prepared: HashSet<Table>,
}

impl SqlSink {
    /// Opens the pool and ensures the error-log table exists.
    pub async fn connect(config: &DatabaseConfig) -> errors::Result<Self> {
        let url = config.url()?;
        let dialect = Dialect::from_url(url)?;
        let error_table = Table::new(config.error_table.as_str())?;

        install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await
            .map_err(|source| SinkError::Connect {
                reason: format!("could not open {} pool", dialect.name()),
                source,
            })?;

        info!(
            dialect = dialect.name(),
            error_table = %error_table,
            "Connected to database"
        );

        let sink = Self {
            pool,
            dialect,
            error_table,
            prepared: HashSet::new(),
        };
        sink.execute_ddl(&sink.error_table, sink.dialect.error_table_ddl(&sink.error_table))
            .await?;
        Ok(sink)
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    async fn execute_ddl(&self, table: &Table, ddl: String) -> Result<(), SinkError> {
        debug!(table = %table, "Ensuring table exists");
        sqlx::query::<Any>(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|source| SinkError::Schema {
                table: table.to_string(),
                source,
            })?;
        Ok(())
    }
}

impl Sink for SqlSink {
    async fn prepare(&mut self, table: &Table) -> Result<(), SinkError> {
        if self.prepared.contains(table) {
            return Ok(());
        }
        self.execute_ddl(table, self.dialect.bars_table_ddl(table))
            .await?;
        self.prepared.insert(table.clone());
        Ok(())
    }

    async fn write_records(
        &mut self,
        table: &Table,
        batch: Vec<ValidRecord>,
    ) -> Result<usize, SinkError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let rows = batch.len();
        let write_err = |source: sqlx::Error| SinkError::Write {
            table: table.to_string(),
            rows,
            source,
        };

        let sql = self.dialect.insert_records_sql(table, rows);
        let mut query = sqlx::query::<Any>(&sql);
        for record in &batch {
            query = query
                .bind(record.date.format(RECORD_DATE_FORMAT).to_string())
                .bind(record.symbol.clone());
            for field in NumericField::ALL {
                query = query.bind(numeric_text(record.get(field)));
            }
        }

        let mut tx = self.pool.begin().await.map_err(write_err)?;
        query.execute(&mut *tx).await.map_err(write_err)?;
        tx.commit().await.map_err(write_err)?;

        debug!(table = %table, rows, "Committed record batch");
        Ok(rows)
    }

    async fn write_errors(&mut self, batch: Vec<RejectedRow>) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }

        let rows = batch.len();
        let table = &self.error_table;
        let write_err = |source: sqlx::Error| SinkError::Write {
            table: table.to_string(),
            rows,
            source,
        };

        let sql = self.dialect.insert_error_sql(table);
        let mut tx = self.pool.begin().await.map_err(write_err)?;
        for row in batch {
            sqlx::query::<Any>(&sql)
                .bind(error_date(row.date.as_deref()))
                .bind(row.launch_timestamp.format(LAUNCH_TIMESTAMP_FORMAT).to_string())
                .bind(row.symbol)
                .bind(row.message)
                .execute(&mut *tx)
                .await
                .map_err(write_err)?;
        }
        tx.commit().await.map_err(write_err)?;

        debug!(table = %table, rows, "Committed error batch");
        Ok(())
    }
}
