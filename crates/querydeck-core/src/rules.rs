//! Ordered rule pipeline that derives views from a fetched snapshot.
//!
//! Each [`Rule`] maps one [`Snapshot`] to another. A rule whose required
//! column is missing is a no-op: it hands its input through unchanged and
//! reports `applied = false`. [`apply_rules`] folds a rule list over a
//! snapshot strictly in configured order and never short-circuits.
//!
//! Rules are built from configuration through [`RULE_KINDS`], a lookup
//! table from the `rule_type` discriminant to a constructor, so an unknown
//! kind is rejected when the definition is loaded rather than at read time.

use std::collections::BTreeMap;
use std::sync::Arc;

use querydeck_types::{CellValue, Snapshot};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;

/// Outcome of applying one rule.
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    /// The resulting snapshot; the input itself when the rule was a no-op.
    pub snapshot: Arc<Snapshot>,
    /// Whether the rule found its columns and transformed the input.
    pub applied: bool,
}

impl RuleOutcome {
    const fn skipped(input: Arc<Snapshot>) -> Self {
        Self {
            snapshot: input,
            applied: false,
        }
    }

    fn applied(output: Snapshot) -> Self {
        Self {
            snapshot: Arc::new(output),
            applied: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Keeps a time column and a metric column, relabels them, and drops the
/// rest. This is the shape the time-series renderer expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionRule {
    /// Source column holding the timestamp.
    pub time_column_header: String,
    /// Source column holding the metric value.
    pub metric_column_header: String,
    /// Output name of the time column; defaults to the source name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_column_label: Option<String>,
    /// Output name of the metric column; defaults to the source name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_column_label: Option<String>,
}

impl ProjectionRule {
    /// Project `input` onto the two configured columns.
    pub fn apply(&self, input: Arc<Snapshot>) -> RuleOutcome {
        let (Some(time_idx), Some(metric_idx)) = (
            input.column_index(&self.time_column_header),
            input.column_index(&self.metric_column_header),
        ) else {
            return RuleOutcome::skipped(input);
        };

        let rows = input
            .ordered_rows()
            .map(|(index, row)| {
                let pick = |i: usize| row.get(i).cloned().unwrap_or(CellValue::Null);
                (index, vec![pick(time_idx), pick(metric_idx)])
            })
            .collect();

        let time_label = self
            .time_column_label
            .as_ref()
            .unwrap_or(&self.time_column_header);
        let metric_label = self
            .metric_column_label
            .as_ref()
            .unwrap_or(&self.metric_column_header);

        RuleOutcome::applied(Snapshot {
            title: input.title.clone(),
            columns: vec![time_label.clone(), metric_label.clone()],
            row_labels: input.row_labels.clone(),
            rows,
            captured_at: input.captured_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Row filter
// ---------------------------------------------------------------------------

/// Keeps only rows whose value in one column matches a regular expression.
///
/// Surviving rows keep their original index; the result may have gaps.
/// `NULL` cells never match.
#[derive(Debug, Clone, Serialize)]
pub struct RowFilterRule {
    /// Column whose text is matched.
    pub column_header_to_check: String,
    /// Source text of the pattern.
    pub regex_string: String,
    #[serde(skip)]
    pattern: Regex,
}

impl RowFilterRule {
    /// Compile a row filter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if `regex_string` does not
    /// compile.
    pub fn new(column_header_to_check: &str, regex_string: &str) -> Result<Self, ConfigError> {
        let pattern = Regex::new(regex_string).map_err(|source| ConfigError::InvalidPattern {
            pattern: regex_string.to_owned(),
            source,
        })?;
        Ok(Self {
            column_header_to_check: column_header_to_check.to_owned(),
            regex_string: regex_string.to_owned(),
            pattern,
        })
    }

    /// Filter `input` down to the matching rows.
    pub fn apply(&self, input: Arc<Snapshot>) -> RuleOutcome {
        let Some(col) = input.column_index(&self.column_header_to_check) else {
            return RuleOutcome::skipped(input);
        };

        let rows: BTreeMap<_, _> = input
            .ordered_rows()
            .filter(|(_, row)| {
                row.get(col)
                    .and_then(CellValue::as_text)
                    .is_some_and(|text| self.pattern.is_match(&text))
            })
            .map(|(index, row)| (index, row.to_vec()))
            .collect();

        RuleOutcome::applied(input.with_rows(rows))
    }
}

#[derive(Debug, Deserialize)]
struct RowFilterFields {
    column_header_to_check: String,
    regex_string: String,
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A configured transformation step.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "rule_type")]
pub enum Rule {
    /// Column projection for time-series extraction.
    #[serde(rename = "timerule")]
    Projection(ProjectionRule),
    /// Row filtering by pattern match.
    #[serde(rename = "regexrule")]
    RowFilter(RowFilterRule),
}

impl Rule {
    /// Apply this rule to `input`.
    pub fn apply(&self, input: Arc<Snapshot>) -> RuleOutcome {
        match self {
            Self::Projection(rule) => rule.apply(input),
            Self::RowFilter(rule) => rule.apply(input),
        }
    }

    /// The canonical `rule_type` name of this rule.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Projection(_) => "timerule",
            Self::RowFilter(_) => "regexrule",
        }
    }

    /// Build a rule from its configuration object.
    ///
    /// The object's `rule_type` field selects a constructor from
    /// [`RULE_KINDS`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRule`] if `rule_type` is missing or the
    /// fields do not fit the kind, [`ConfigError::UnknownRuleKind`] for an
    /// unregistered kind, and [`ConfigError::InvalidPattern`] for a row
    /// filter whose pattern does not compile.
    pub fn from_config(value: &serde_json::Value) -> Result<Self, ConfigError> {
        let kind = value
            .get("rule_type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ConfigError::InvalidRule {
                kind: String::new(),
                message: "missing `rule_type`".to_owned(),
            })?;

        let (_, build) = RULE_KINDS
            .iter()
            .find(|(name, _)| *name == kind)
            .ok_or_else(|| ConfigError::UnknownRuleKind(kind.to_owned()))?;

        build(value)
    }
}

/// Constructor for one rule kind.
pub type RuleConstructor = fn(&serde_json::Value) -> Result<Rule, ConfigError>;

/// Registered rule kinds, keyed by their `rule_type` discriminant.
pub const RULE_KINDS: &[(&str, RuleConstructor)] = &[
    ("timerule", build_projection),
    ("projection", build_projection),
    ("regexrule", build_row_filter),
    ("row_filter", build_row_filter),
];

fn invalid_rule(kind: &str, err: &serde_json::Error) -> ConfigError {
    ConfigError::InvalidRule {
        kind: kind.to_owned(),
        message: err.to_string(),
    }
}

fn build_projection(value: &serde_json::Value) -> Result<Rule, ConfigError> {
    let rule = ProjectionRule::deserialize(value).map_err(|e| invalid_rule("timerule", &e))?;
    Ok(Rule::Projection(rule))
}

fn build_row_filter(value: &serde_json::Value) -> Result<Rule, ConfigError> {
    let fields = RowFilterFields::deserialize(value).map_err(|e| invalid_rule("regexrule", &e))?;
    Ok(Rule::RowFilter(RowFilterRule::new(
        &fields.column_header_to_check,
        &fields.regex_string,
    )?))
}

/// Fold `rules` over `snapshot` in order.
///
/// Each rule receives its predecessor's output. No-op rules pass their
/// input through and the pipeline carries on.
pub fn apply_rules(rules: &[Rule], snapshot: Arc<Snapshot>) -> Arc<Snapshot> {
    rules.iter().enumerate().fold(snapshot, |current, (position, rule)| {
        let outcome = rule.apply(current);
        if !outcome.applied {
            debug!(
                position,
                rule_type = rule.kind(),
                title = %outcome.snapshot.title,
                "rule not applied, required column missing"
            );
        }
        outcome.snapshot
    })
}
