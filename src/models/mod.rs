//! Shared data models for the report, oracle groups and run results.

pub mod report;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A root-cause cluster. Deserialized from the oracle's answer, then
/// rewritten in place by the reconciler.
pub struct Group {
    pub label: String,
    pub root_cause: String,
    #[serde(default)]
    pub rule_id: String,
    #[serde(default)]
    pub incident_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
/// An oracle-returned identifier that matched no known instance of the rule.
pub struct UnknownIncident {
    pub rule_id: String,
    pub group: String,
    pub incident_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
/// Reconciled output for one processed rule, handed to the reporter.
pub struct RuleGroups {
    pub rule_id: String,
    pub instances: usize,
    pub analyzed: usize,
    pub groups: Vec<Group>,
    #[serde(skip)]
    pub label: Option<String>,
    #[serde(skip)]
    pub severity: Option<String>,
    #[serde(skip)]
    pub dropped: Vec<UnknownIncident>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
/// Counters for a whole run.
pub struct RunSummary {
    pub ranked: usize,
    pub processed: usize,
    pub skipped: usize,
    pub no_result: usize,
    pub failed: usize,
    pub groups: usize,
    pub dropped_ids: usize,
}
