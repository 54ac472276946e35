//! Renderers from snapshots to the dashboard response shapes.
//!
//! Both renderers are pure. The table renderer emits every column as a
//! `"string"` typed descriptor plus rows in ascending index order. The
//! time-series renderer expects a timestamp in the first column and a
//! metric in the second and emits `[metric, epoch_millis]` pairs.

use querydeck_types::{CellValue, Snapshot};
use serde::Serialize;

use crate::error::CacheError;

/// Requested output shape of a batch read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Tabular grid.
    Table,
    /// Time-series point list.
    TimeSeries,
}

impl OutputKind {
    /// Map a target `type` from a dashboard query. Only `"table"` selects
    /// the grid; anything else is a time series.
    pub fn from_target_type(target_type: &str) -> Self {
        if target_type == "table" {
            Self::Table
        } else {
            Self::TimeSeries
        }
    }
}

/// Column descriptor in a table frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableColumn {
    /// Column name.
    pub text: String,
    /// Type tag; always `"string"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// One consumer rendered as a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableFrame {
    /// Column descriptors in order.
    pub columns: Vec<TableColumn>,
    /// Rows in ascending index order.
    pub rows: Vec<Vec<CellValue>>,
    /// Frame type tag; always `"table"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// One consumer rendered as a time series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesFrame {
    /// `[metric, epoch_millis]` pairs in ascending row order.
    pub datapoints: Vec<(CellValue, i64)>,
    /// Name of the consumer the points came from.
    pub target: String,
}

/// A rendered batch, one element per requested consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RenderedBatch {
    /// Table frames.
    Table(Vec<TableFrame>),
    /// Time-series frames.
    TimeSeries(Vec<TimeSeriesFrame>),
}

impl RenderedBatch {
    /// Number of frames in the batch.
    pub fn len(&self) -> usize {
        match self {
            Self::Table(frames) => frames.len(),
            Self::TimeSeries(frames) => frames.len(),
        }
    }

    /// Whether the batch has no frames.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Render a snapshot as a table frame.
pub fn render_table(snapshot: &Snapshot) -> TableFrame {
    TableFrame {
        columns: snapshot
            .columns
            .iter()
            .map(|name| TableColumn {
                text: name.clone(),
                kind: "string",
            })
            .collect(),
        rows: snapshot.ordered_rows().map(|(_, row)| row.to_vec()).collect(),
        kind: "table",
    }
}

/// Render a snapshot as a time-series frame named `target`.
///
/// # Errors
///
/// Returns [`CacheError::TypeMismatch`] if the snapshot has fewer than two
/// columns or any row's first cell is not a timestamp.
pub fn render_time_series(target: &str, snapshot: &Snapshot) -> Result<TimeSeriesFrame, CacheError> {
    let mismatch = |detail: String| CacheError::TypeMismatch {
        consumer: target.to_owned(),
        detail,
    };

    if snapshot.columns.len() < 2 {
        return Err(mismatch(format!(
            "time series needs a time and a metric column, found {} column(s)",
            snapshot.columns.len()
        )));
    }

    let datapoints = snapshot
        .ordered_rows()
        .map(|(index, row)| {
            let Some(ts) = row.first().and_then(CellValue::as_timestamp) else {
                let found = row.first().map_or("missing", CellValue::type_name);
                return Err(mismatch(format!(
                    "row {index}: first column is {found}, expected timestamp"
                )));
            };
            let metric = row.get(1).cloned().unwrap_or(CellValue::Null);
            Ok((metric, ts.timestamp_millis()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TimeSeriesFrame {
        datapoints,
        target: target.to_owned(),
    })
}
