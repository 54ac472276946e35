//! Row decoding from driver rows to [`CellValue`]s.
//!
//! Each column is decoded according to its SQL type name. Types without a
//! native mapping are read as text; a cell that cannot be read as text
//! becomes [`CellValue::Null`] and is traced at `debug`.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use querydeck_types::CellValue;
use rust_decimal::Decimal;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo};
use tracing::debug;
use uuid::Uuid;

/// Read column `idx` as `Option<T>` and wrap a present value.
fn decode_with<'r, R, T, F>(row: &'r R, idx: usize, wrap: F) -> Result<CellValue, sqlx::Error>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
    F: FnOnce(T) -> CellValue,
{
    Ok(row
        .try_get::<Option<T>, _>(idx)?
        .map_or(CellValue::Null, wrap))
}

fn int<T: Into<i64>>(v: T) -> CellValue {
    CellValue::Int(v.into())
}

fn date(d: NaiveDate) -> CellValue {
    CellValue::Timestamp(d.and_time(NaiveTime::MIN).and_utc())
}

fn naive(ts: NaiveDateTime) -> CellValue {
    CellValue::Timestamp(ts.and_utc())
}

fn unsigned(v: u64) -> CellValue {
    i64::try_from(v).map_or_else(|_| CellValue::Decimal(Decimal::from(v)), CellValue::Int)
}

fn pg_cell(row: &PgRow, idx: usize, sql_type: &str) -> Result<CellValue, sqlx::Error> {
    match sql_type {
        "BOOL" => decode_with(row, idx, CellValue::Bool),
        "INT2" => decode_with(row, idx, int::<i16>),
        "INT4" => decode_with(row, idx, int::<i32>),
        "INT8" => decode_with(row, idx, CellValue::Int),
        "FLOAT4" => decode_with(row, idx, |v: f32| CellValue::Float(f64::from(v))),
        "FLOAT8" => decode_with(row, idx, CellValue::Float),
        "NUMERIC" => decode_with(row, idx, CellValue::Decimal),
        "TIMESTAMPTZ" => decode_with(row, idx, CellValue::Timestamp),
        "TIMESTAMP" => decode_with(row, idx, naive),
        "DATE" => decode_with(row, idx, date),
        "UUID" => decode_with(row, idx, |v: Uuid| CellValue::Text(v.to_string())),
        "JSON" | "JSONB" => {
            decode_with(row, idx, |v: serde_json::Value| CellValue::Text(v.to_string()))
        }
        _ => decode_with(row, idx, CellValue::Text),
    }
}

fn mysql_cell(row: &MySqlRow, idx: usize, sql_type: &str) -> Result<CellValue, sqlx::Error> {
    match sql_type {
        "BOOLEAN" => decode_with(row, idx, CellValue::Bool),
        "TINYINT" => decode_with(row, idx, int::<i8>),
        "SMALLINT" => decode_with(row, idx, int::<i16>),
        "MEDIUMINT" | "INT" => decode_with(row, idx, int::<i32>),
        "BIGINT" => decode_with(row, idx, CellValue::Int),
        "TINYINT UNSIGNED" => decode_with(row, idx, int::<u8>),
        "SMALLINT UNSIGNED" => decode_with(row, idx, int::<u16>),
        "MEDIUMINT UNSIGNED" | "INT UNSIGNED" => decode_with(row, idx, int::<u32>),
        "BIGINT UNSIGNED" => decode_with(row, idx, unsigned),
        "FLOAT" => decode_with(row, idx, |v: f32| CellValue::Float(f64::from(v))),
        "DOUBLE" => decode_with(row, idx, CellValue::Float),
        "DECIMAL" => decode_with(row, idx, CellValue::Decimal),
        "TIMESTAMP" => decode_with(row, idx, CellValue::Timestamp),
        "DATETIME" => decode_with(row, idx, naive),
        "DATE" => decode_with(row, idx, date),
        "JSON" => decode_with(row, idx, |v: serde_json::Value| CellValue::Text(v.to_string())),
        _ => decode_with(row, idx, CellValue::Text),
    }
}

fn decode_row<R, F>(row: &R, cell: F) -> Vec<CellValue>
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> String: Decode<'r, R::Database> + Type<R::Database>,
    F: Fn(&R, usize, &str) -> Result<CellValue, sqlx::Error>,
{
    row.columns()
        .iter()
        .map(|col| {
            let idx = col.ordinal();
            let sql_type = col.type_info().name();
            cell(row, idx, sql_type)
                .or_else(|_| decode_with(row, idx, CellValue::Text))
                .unwrap_or_else(|e| {
                    debug!(
                        column = col.name(),
                        sql_type,
                        error = %e,
                        "undecodable cell, using NULL"
                    );
                    CellValue::Null
                })
        })
        .collect()
}

/// Decode every column of a `PostgreSQL` row.
pub fn pg_row(row: &PgRow) -> Vec<CellValue> {
    decode_row(row, pg_cell)
}

/// Decode every column of a `MySQL` row.
pub fn mysql_row(row: &MySqlRow) -> Vec<CellValue> {
    decode_row(row, mysql_cell)
}

/// Column names of a row, in order.
pub fn column_names<R: Row>(row: &R) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_owned()).collect()
}
