//! Rule index: ruleId -> instances, plus the processing order.
//!
//! The index borrows from the report and is rebuilt on every run. Instance
//! order is insertion order (projects in report order, then instances in
//! project order); nothing is sorted.

use crate::models::report::{Project, RuleInstance, RuleSet};
use std::collections::HashMap;

/// Non-owning secondary index over all rule instances of a report.
pub struct RuleIndex<'r> {
    entries: HashMap<&'r str, Vec<&'r RuleInstance>>,
    /// Rule ids in first-seen order, for deterministic iteration.
    seen: Vec<&'r str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A rule id with the number of instances indexed for it.
pub struct RankedRule<'r> {
    pub rule_id: &'r str,
    pub count: usize,
}

impl<'r> RuleIndex<'r> {
    /// Single pass over every project and instance.
    pub fn build(projects: &'r [Project]) -> Self {
        let mut entries: HashMap<&'r str, Vec<&'r RuleInstance>> = HashMap::new();
        let mut seen = Vec::new();
        for project in projects {
            for inst in &project.rule_instances {
                let list = entries.entry(inst.rule_id.as_str()).or_insert_with(|| {
                    seen.push(inst.rule_id.as_str());
                    Vec::new()
                });
                list.push(inst);
            }
        }
        RuleIndex { entries, seen }
    }

    /// Instances for `rule_id`, empty when the rule has none.
    pub fn instances(&self, rule_id: &str) -> &[&'r RuleInstance] {
        self.entries.get(rule_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, rule_id: &str) -> usize {
        self.entries.get(rule_id).map_or(0, Vec::len)
    }

    /// Indexed rule ids in first-seen order.
    pub fn rule_ids(&self) -> &[&'r str] {
        &self.seen
    }

    /// Rule ids referenced by instances but missing from `rules`.
    pub fn orphans(&self, rules: &RuleSet) -> Vec<&'r str> {
        self.seen
            .iter()
            .copied()
            .filter(|id| !rules.contains(id))
            .collect()
    }

    /// Rules ordered by descending instance count.
    ///
    /// Only ids from `rules` are ranked; rules without instances count as 0.
    /// The sort is stable, so ties keep the rule set's document order.
    pub fn rank<'s>(&self, rules: &'s RuleSet) -> Vec<RankedRule<'s>> {
        let mut ranked: Vec<RankedRule<'s>> = rules
            .iter()
            .map(|rule| RankedRule {
                rule_id: rule.id.as_str(),
                count: self.count(&rule.id),
            })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::report::{Location, LocationKind, Rule, State};

    pub(crate) fn inst(incident: &str, rule: &str) -> RuleInstance {
        RuleInstance {
            incident_id: incident.to_string(),
            rule_id: rule.to_string(),
            project_path: "App/App.csproj".to_string(),
            state: State::Active,
            location: Location {
                kind: LocationKind::File,
                path: format!("src/{}.cs", incident),
                snippet: format!("call_{}();", incident),
                protected_snippet: "call_<redacted>();".to_string(),
                label: None,
                line: None,
                column: None,
            },
        }
    }

    pub(crate) fn rules(ids: &[&str]) -> RuleSet {
        ids.iter()
            .map(|id| Rule {
                id: id.to_string(),
                ..Rule::default()
            })
            .collect()
    }

    fn projects() -> Vec<Project> {
        vec![
            Project {
                path: "a".into(),
                rule_instances: vec![inst("a1", "R1"), inst("a2", "R2"), inst("a3", "R1")],
            },
            Project {
                path: "b".into(),
                rule_instances: vec![inst("b1", "R2"), inst("b2", "R1"), inst("b3", "X9")],
            },
        ]
    }

    #[test]
    fn test_build_keeps_insertion_order() {
        let projects = projects();
        let index = RuleIndex::build(&projects);
        let r1: Vec<&str> = index
            .instances("R1")
            .iter()
            .map(|i| i.incident_id.as_str())
            .collect();
        assert_eq!(r1, vec!["a1", "a3", "b2"]);
        assert_eq!(index.rule_ids(), &["R1", "R2", "X9"]);
        assert!(index.instances("nope").is_empty());
    }

    #[test]
    fn test_rank_descending_with_stable_ties() {
        let projects = projects();
        let index = RuleIndex::build(&projects);
        let set = rules(&["R0", "R2", "R1", "R3"]);
        let ranked = index.rank(&set);
        let order: Vec<(&str, usize)> = ranked.iter().map(|r| (r.rule_id, r.count)).collect();
        assert_eq!(order, vec![("R1", 3), ("R2", 2), ("R0", 0), ("R3", 0)]);
    }

    #[test]
    fn test_rank_excludes_unknown_rules_and_counts_exactly() {
        let projects = projects();
        let index = RuleIndex::build(&projects);
        let set = rules(&["R1", "R2"]);
        let ranked = index.rank(&set);
        assert!(ranked.iter().all(|r| set.contains(r.rule_id)));
        for r in &ranked {
            assert_eq!(r.count, index.instances(r.rule_id).len());
        }
        assert_eq!(index.orphans(&set), vec!["X9"]);
    }
}
