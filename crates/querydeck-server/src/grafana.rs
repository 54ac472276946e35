//! Request bodies of the Grafana simple-JSON datasource protocol.
//!
//! Only the fields the API acts on are modelled. Grafana also sends
//! `range`, `interval`, `maxDataPoints` and friends; serde ignores them.

use querydeck_core::OutputKind;
use serde::Deserialize;

/// Body of `POST /query`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    /// Requested targets in panel order.
    #[serde(default)]
    pub targets: Vec<QueryTarget>,
}

/// One panel target.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryTarget {
    /// Consumer name.
    #[serde(default)]
    pub target: String,
    /// Grafana's per-target reference id.
    #[serde(default)]
    pub ref_id: String,
    /// `"table"` or `"timeserie"`.
    #[serde(default, rename = "type")]
    pub target_type: String,
}

impl QueryRequest {
    /// Output kind for the whole batch, taken from the first target.
    pub fn output_kind(&self) -> Option<OutputKind> {
        self.targets
            .first()
            .map(|t| OutputKind::from_target_type(&t.target_type))
    }

    /// Consumer names in target order.
    pub fn consumer_names(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.target.clone()).collect()
    }
}
