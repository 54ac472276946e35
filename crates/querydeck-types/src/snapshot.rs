//! Captured tabular result sets.
//!
//! A [`Snapshot`] is the unit the cache stores and the rule pipeline
//! transforms. Once built it is shared behind an `Arc` and never mutated;
//! every transformation produces a new value.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cell::CellValue;

/// 1-based positional index of a row, in fetch order.
pub type RowIndex = u64;

/// Raw output of a data source execution, before it becomes a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names reported by the data source.
    pub columns: Vec<String>,
    /// Rows in fetch order.
    pub rows: Vec<Vec<CellValue>>,
}

/// One fetched result set with its bookkeeping.
///
/// Rows are keyed by [`RowIndex`]. A freshly fetched snapshot has
/// contiguous indices starting at 1; a filtered one may have gaps, since
/// filtering keeps the original index of every surviving row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Display title, the query name for fetched snapshots.
    pub title: String,
    /// Ordered column names.
    #[serde(rename = "column_list")]
    pub columns: Vec<String>,
    /// Optional, decorative row labels.
    #[serde(rename = "row_list")]
    pub row_labels: Vec<String>,
    /// Row values keyed by row index.
    #[serde(rename = "rowdata")]
    pub rows: BTreeMap<RowIndex, Vec<CellValue>>,
    /// When the underlying data was captured.
    #[serde(rename = "updated_time")]
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    /// A snapshot with no rows, captured at the Unix epoch.
    ///
    /// Used as the cached value of a query that has never been fetched.
    pub fn empty(title: &str, columns: Vec<String>, row_labels: Vec<String>) -> Self {
        Self {
            title: title.to_owned(),
            columns,
            row_labels,
            rows: BTreeMap::new(),
            captured_at: DateTime::UNIX_EPOCH,
        }
    }

    /// Build a snapshot from fetched rows, numbering them from 1.
    ///
    /// Every row is padded with [`CellValue::Null`] or truncated so that it
    /// has exactly as many cells as `columns`. Returns the snapshot and the
    /// number of rows that had to be reshaped.
    pub fn from_fetched(
        title: &str,
        columns: Vec<String>,
        row_labels: Vec<String>,
        fetched: Vec<Vec<CellValue>>,
        captured_at: DateTime<Utc>,
    ) -> (Self, usize) {
        let width = columns.len();
        let mut reshaped = 0_usize;
        let rows = (1..)
            .zip(fetched)
            .map(|(index, mut row)| {
                if row.len() != width {
                    reshaped = reshaped.saturating_add(1);
                    row.resize(width, CellValue::Null);
                }
                (index, row)
            })
            .collect();

        let snapshot = Self {
            title: title.to_owned(),
            columns,
            row_labels,
            rows,
            captured_at,
        };
        (snapshot, reshaped)
    }

    /// Position of the first column with exactly this name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Number of rows held.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows in ascending index order.
    pub fn ordered_rows(&self) -> impl Iterator<Item = (RowIndex, &[CellValue])> {
        self.rows.iter().map(|(index, row)| (*index, row.as_slice()))
    }

    /// A copy of this snapshot's metadata with a different row set.
    pub fn with_rows(&self, rows: BTreeMap<RowIndex, Vec<CellValue>>) -> Self {
        Self {
            title: self.title.clone(),
            columns: self.columns.clone(),
            row_labels: self.row_labels.clone(),
            rows,
            captured_at: self.captured_at,
        }
    }
}
