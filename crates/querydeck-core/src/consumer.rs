//! Consumer (data selector) definitions.
//!
//! A consumer binds one query to an ordered rule pipeline and keeps the
//! derived snapshot that pipeline last produced. Many consumers may share
//! a query; the derived view is private to each.

use std::sync::{Arc, PoisonError, RwLock};

use querydeck_types::Snapshot;
use serde::Serialize;

use crate::refresh::RefreshOutcome;
use crate::rules::{Rule, apply_rules};

#[derive(Debug)]
struct DerivedView {
    snapshot: Arc<Snapshot>,
    /// Generation of the query snapshot this view was derived from.
    source_generation: Option<u64>,
}

/// A named binding of a query to a rule pipeline.
#[derive(Debug)]
pub struct ConsumerDefinition {
    /// Unique logical name.
    pub name: String,
    /// Name of the query this consumer reads.
    pub query_name: String,
    /// Rules applied in order to every new query snapshot.
    pub rules: Vec<Rule>,
    derived: RwLock<DerivedView>,
}

impl ConsumerDefinition {
    /// Create a consumer whose derived view starts as `placeholder`.
    pub fn new(name: &str, query_name: &str, rules: Vec<Rule>, placeholder: Arc<Snapshot>) -> Self {
        Self {
            name: name.to_owned(),
            query_name: query_name.to_owned(),
            rules,
            derived: RwLock::new(DerivedView {
                snapshot: placeholder,
                source_generation: None,
            }),
        }
    }

    /// The last derived snapshot.
    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(
            &self
                .derived
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .snapshot,
        )
    }

    /// Return the derived view for a refresh outcome of the underlying query.
    ///
    /// The rule pipeline runs only when the outcome was freshly fetched or
    /// carries a newer generation than the one the current view was built
    /// from (another consumer of the same query did the refresh). In every
    /// other case the stored view is returned as is.
    pub fn derive(&self, outcome: &RefreshOutcome) -> Arc<Snapshot> {
        {
            let view = self.derived.read().unwrap_or_else(PoisonError::into_inner);
            if !outcome.refreshed && view.source_generation == Some(outcome.generation) {
                return Arc::clone(&view.snapshot);
            }
        }

        let derived = apply_rules(&self.rules, Arc::clone(&outcome.snapshot));

        let mut view = self.derived.write().unwrap_or_else(PoisonError::into_inner);
        // Never let an older generation overwrite a newer view.
        if view
            .source_generation
            .is_none_or(|g| g <= outcome.generation)
        {
            view.snapshot = Arc::clone(&derived);
            view.source_generation = Some(outcome.generation);
        }
        derived
    }

    /// Serializable view of this definition for inspection endpoints.
    pub fn summary(&self) -> ConsumerSummary<'_> {
        ConsumerSummary {
            name: &self.name,
            query_name: &self.query_name,
            rules: &self.rules,
            current_data_block: self.current(),
        }
    }
}

/// JSON shape of a consumer definition.
#[derive(Debug, Serialize)]
pub struct ConsumerSummary<'a> {
    /// Unique logical name.
    pub name: &'a str,
    /// Referenced query.
    pub query_name: &'a str,
    /// Rule pipeline in order.
    pub rules: &'a [Rule],
    /// Last derived snapshot.
    pub current_data_block: Arc<Snapshot>,
}
