//! Result reconciliation: the trust boundary between oracle output and the
//! report.
//!
//! Every group gets the rule id attached and its incident ids rewritten to
//! the subset that names a known instance of that same rule. Matching is
//! case-insensitive; the oracle's spelling of a matched id is kept. Group
//! order and id order are preserved apart from removals.

use crate::models::report::RuleInstance;
use crate::models::{Group, UnknownIncident};
use std::collections::HashSet;

/// Validate `groups` in place against `known`, returning the dropped ids.
///
/// One warning is logged per dropped id.
pub fn reconcile(rule_id: &str, groups: &mut [Group], known: &[&RuleInstance]) -> Vec<UnknownIncident> {
    let known_ids: HashSet<String> = known
        .iter()
        .map(|inst| inst.incident_id.to_lowercase())
        .collect();
    let mut unknown = Vec::new();
    for group in groups.iter_mut() {
        group.rule_id = rule_id.to_string();
        let raw = std::mem::take(&mut group.incident_ids);
        for id in raw {
            if known_ids.contains(&id.to_lowercase()) {
                group.incident_ids.push(id);
            } else {
                tracing::warn!(
                    rule = rule_id,
                    group = %group.label,
                    incident = %id,
                    "dropping unknown incident id"
                );
                unknown.push(UnknownIncident {
                    rule_id: rule_id.to_string(),
                    group: group.label.clone(),
                    incident_id: id,
                });
            }
        }
    }
    unknown
}
