use std::path::Path;

use bars_ingest_core::config::{IngestConfig, LoadConfig};
use bars_ingest_core::errors::*;
use bars_ingest_core::sink::sql::SqlSink;
use bars_ingest_core::{Ingestor, Table};
use tempfile::TempDir;

const HEADER: &str = "Date,Symbol,Adj Close,Close,High,Low,Open,Volume";

fn write_csv(dir: &Path, name: &str, lines: &[String]) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut data = format!("{HEADER}\n");
    for line in lines {
        data.push_str(line);
        data.push('\n');
    }
    std::fs::write(&path, data).unwrap();
    path
}

fn config_for(dir: &TempDir, loads: Vec<LoadConfig>) -> IngestConfig {
    let mut config = IngestConfig::default().with_database_url(Some(format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("bars.db").display()
    )));
    config.loads = loads;
    config
}

async fn count(sink: &SqlSink, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(sink.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_two_loads_into_sqlite() {
    let dir = tempfile::tempdir().unwrap();

    let mut first: Vec<String> = (0..130)
        .map(|i| format!("2020-01-{:02},AAA,1.0,{i}.5,2,0.5,1,{i}", i % 28 + 1))
        .collect();
    first.push("bad-date,AAA,1,1,1,1,1,1".to_string());
    first.push("2020-02-01,AAA,,,,,,".to_string());
    let second = vec![
        "2021/03/04,BBB,3,3,3,3,3,300".to_string(),
        "2021-03-05,BBB,3,abc,3,3,3,300".to_string(),
    ];

    let loads = vec![
        LoadConfig {
            name: "bars_1".to_string(),
            path: write_csv(dir.path(), "bars_1.csv", &first),
            table: "bars_1".to_string(),
        },
        LoadConfig {
            name: "bars_2".to_string(),
            path: write_csv(dir.path(), "bars_2.csv", &second),
            table: "bars_2".to_string(),
        },
    ];
    let config = config_for(&dir, loads);
    config.validate().unwrap();

    let sink = SqlSink::connect(&config.database).await.unwrap();
    let mut ingestor = Ingestor::new(sink, config.processing.clone());

    let m1 = ingestor.run_load(&config.loads[0]).await.unwrap();
    assert_eq!(m1.rows_read, 132);
    assert_eq!(m1.valid_count, 131);
    assert_eq!(m1.error_count, 1);
    assert_eq!(m1.record_batches, 2);

    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    let m2 = ingestor.run_load(&config.loads[1]).await.unwrap();
    assert_eq!(m2.valid_count, 1);
    assert_eq!(m2.error_count, 1);

    let sink = ingestor.into_sink();
    assert_eq!(count(&sink, "bars_1").await, 131);
    assert_eq!(count(&sink, "bars_2").await, 1);
    assert_eq!(count(&sink, "error_logs").await, 2);

    let last: (String, String, String) =
        sqlx::query_as("SELECT date, close, volume FROM bars_1 ORDER BY id DESC LIMIT 1")
            .fetch_one(sink.pool())
            .await
            .unwrap();
    assert_eq!(
        last,
        ("2020/02/01".to_string(), "0.0".to_string(), "0.0".to_string())
    );

    let date: String = sqlx::query_scalar("SELECT date FROM bars_2")
        .fetch_one(sink.pool())
        .await
        .unwrap();
    assert_eq!(date, "2021/03/04");

    let messages: Vec<(String, Option<String>)> =
        sqlx::query_as("SELECT message, CAST(date AS TEXT) FROM error_logs ORDER BY id")
            .fetch_all(sink.pool())
            .await
            .unwrap();
    assert!(messages[0].0.contains("bad-date"));
    assert_eq!(messages[0].1, None);
    assert!(messages[1].0.starts_with("invalid numeric field close"));
    assert_eq!(messages[1].1.as_deref(), Some("2021-03-05 00:00:00"));

    let stamps: Vec<String> =
        sqlx::query_scalar("SELECT CAST(launch_timestamp AS TEXT) FROM error_logs ORDER BY id")
            .fetch_all(sink.pool())
            .await
            .unwrap();
    assert_eq!(stamps.len(), 2);
    assert!(stamps[0] < stamps[1]);

    let distinct: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT launch_timestamp) FROM error_logs")
            .fetch_one(sink.pool())
            .await
            .unwrap();
    assert_eq!(distinct, 2);
}

#[tokio::test]
async fn test_rerun_appends_without_recreating_tables() {
    let dir = tempfile::tempdir().unwrap();
    let lines: Vec<String> = (0..5)
        .map(|i| format!("2020-01-0{},CCC,1,1,1,1,1,1", i + 1))
        .collect();
    let load = LoadConfig {
        name: "bars_1".to_string(),
        path: write_csv(dir.path(), "bars_1.csv", &lines),
        table: "bars_1".to_string(),
    };
    let config = config_for(&dir, vec![load]);

    for _ in 0..2 {
        let sink = SqlSink::connect(&config.database).await.unwrap();
        let mut ingestor = Ingestor::new(sink, config.processing.clone());
        let metrics = ingestor.run_load(&config.loads[0]).await.unwrap();
        assert_eq!(metrics.valid_count, 5);
    }

    let sink = SqlSink::connect(&config.database).await.unwrap();
    assert_eq!(count(&sink, "bars_1").await, 10);
}

#[tokio::test]
async fn test_invalid_table_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let load = LoadConfig {
        name: "bad".to_string(),
        path: write_csv(dir.path(), "bad.csv", &[]),
        table: "bars-1".to_string(),
    };
    let config = config_for(&dir, vec![load]);
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidTable { .. })
    ));

    let sink = SqlSink::connect(&config.database).await.unwrap();
    let mut ingestor = Ingestor::new(sink, config.processing.clone());
    let err = ingestor.run_load(&config.loads[0]).await.unwrap_err();
    assert!(matches!(err, IngestionError::Config(_)));
    assert!(Table::new("bars_1").is_ok());
}
