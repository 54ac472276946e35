//! Integration tests for the `querydeck-db` data sources.
//!
//! These tests need a live `PostgreSQL` server. Point
//! `QUERYDECK_TEST_PG_URL` at it and run:
//!
//! ```bash
//! QUERYDECK_TEST_PG_URL=postgresql://user:pw@localhost:5432/db \
//!     cargo test -p querydeck-db -- --ignored
//! ```
//!
//! All tests are marked `#[ignore]` so they are skipped during normal
//! `cargo test` runs.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing
)]

use querydeck_core::config::{DataSourceConfig, DatabaseSettings};
use querydeck_core::{DataSourceExecutor, ExecuteError};
use querydeck_db::DataSourceRegistry;
use querydeck_types::CellValue;
use rust_decimal::Decimal;

async fn registry() -> DataSourceRegistry {
    let url = std::env::var("QUERYDECK_TEST_PG_URL")
        .expect("QUERYDECK_TEST_PG_URL must point at a PostgreSQL server");
    let config = DataSourceConfig {
        name: "pg".to_owned(),
        db_type: "postgres".to_owned(),
        host: String::new(),
        port: None,
        db_name: String::new(),
        username: String::new(),
        password: String::new(),
        url: Some(url),
    };
    let (registry, diagnostics) =
        DataSourceRegistry::connect_all(&[config], &DatabaseSettings::default()).await;
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    registry
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn decodes_common_column_types() {
    let registry = registry().await;
    let result = registry
        .execute(
            "pg",
            "SELECT 1::int4 AS n, 2.5::float8 AS f, 12.34::numeric AS d, \
             'east'::text AS region, true AS flag, NULL::text AS missing, \
             TIMESTAMPTZ '2024-01-01 00:00:00+00' AS ts",
        )
        .await
        .unwrap();

    assert_eq!(
        result.columns,
        vec!["n", "f", "d", "region", "flag", "missing", "ts"]
    );
    let row = &result.rows[0];
    assert_eq!(row[0], CellValue::Int(1));
    assert_eq!(row[1], CellValue::Float(2.5));
    assert_eq!(row[2], CellValue::Decimal(Decimal::new(1234, 2)));
    assert_eq!(row[3], CellValue::Text("east".to_owned()));
    assert_eq!(row[4], CellValue::Bool(true));
    assert_eq!(row[5], CellValue::Null);
    assert_eq!(
        row[6].as_timestamp().map(|t| t.to_rfc3339()),
        Some("2024-01-01T00:00:00+00:00".to_owned())
    );
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn unmapped_types_fall_back_to_text() {
    let registry = registry().await;
    let result = registry
        .execute("pg", "SELECT '10.0.0.1'::inet AS addr, interval '1 day' AS span")
        .await
        .unwrap();
    let row = &result.rows[0];
    assert!(matches!(&row[0], CellValue::Text(_) | CellValue::Null));
    assert!(matches!(&row[1], CellValue::Text(_) | CellValue::Null));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn rows_keep_fetch_order() {
    let registry = registry().await;
    let result = registry
        .execute("pg", "SELECT g FROM generate_series(1, 5) AS g ORDER BY g DESC")
        .await
        .unwrap();
    let values: Vec<_> = result.rows.iter().map(|r| r[0].clone()).collect();
    assert_eq!(
        values,
        (1..=5).rev().map(CellValue::Int).collect::<Vec<_>>()
    );
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn syntax_error_is_a_failed_execution() {
    let registry = registry().await;
    let err = registry.execute("pg", "SELEC nonsense").await.unwrap_err();
    assert!(matches!(err, ExecuteError::Failed { .. }));
}
