//! Sequential per-rule driver.
//!
//! For each ranked rule: select a batch, invoke the oracle once, reconcile
//! the answer, emit it, and only then move on. Rules never share mutable
//! state; the report and the index are read-only for the whole run.

use crate::batch::{self, Bounds};
use crate::index::RuleIndex;
use crate::models::report::Report;
use crate::models::{RuleGroups, RunSummary};
use crate::oracle::{self, ContextOptions, Oracle};
use crate::reconcile::reconcile;

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub bounds: Bounds,
    pub context: ContextOptions,
    /// Restrict processing to these rule ids; empty means all rules.
    pub only_rules: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What happened to one ranked rule.
pub enum RuleOutcome {
    Skipped,
    NoResult,
    Failed,
    Emitted { groups: usize, dropped: usize },
}

/// Run every ranked rule through the pipeline, calling `emit` once per
/// rule with a result. An `emit` error aborts the run.
pub fn run<F>(
    report: &Report,
    index: &RuleIndex<'_>,
    oracle: &dyn Oracle,
    opts: &PipelineOptions,
    mut emit: F,
) -> anyhow::Result<RunSummary>
where
    F: FnMut(&RuleGroups) -> anyhow::Result<()>,
{
    let mut summary = RunSummary::default();
    for ranked in index.rank(&report.rules) {
        if !opts.only_rules.is_empty() && !opts.only_rules.iter().any(|r| r == ranked.rule_id) {
            continue;
        }
        summary.ranked += 1;
        match process_rule(report, index, oracle, opts, ranked.rule_id, &mut emit)? {
            RuleOutcome::Skipped => summary.skipped += 1,
            RuleOutcome::NoResult => summary.no_result += 1,
            RuleOutcome::Failed => summary.failed += 1,
            RuleOutcome::Emitted { groups, dropped } => {
                summary.processed += 1;
                summary.groups += groups;
                summary.dropped_ids += dropped;
            }
        }
    }
    Ok(summary)
}

/// Process a single rule end to end.
pub fn process_rule<F>(
    report: &Report,
    index: &RuleIndex<'_>,
    oracle: &dyn Oracle,
    opts: &PipelineOptions,
    rule_id: &str,
    emit: &mut F,
) -> anyhow::Result<RuleOutcome>
where
    F: FnMut(&RuleGroups) -> anyhow::Result<()>,
{
    let instances = index.instances(rule_id);
    let Some(batch) = batch::select(instances, &opts.bounds) else {
        tracing::debug!(
            rule = rule_id,
            instances = instances.len(),
            min = opts.bounds.min_instances,
            "below minimum, skipped"
        );
        return Ok(RuleOutcome::Skipped);
    };
    if batch.is_empty() {
        tracing::debug!(rule = rule_id, "no instances, skipped");
        return Ok(RuleOutcome::Skipped);
    }
    let rule = report.rules.get(rule_id);
    tracing::info!(
        rule = rule_id,
        instances = instances.len(),
        batch = batch.len(),
        "analyzing"
    );

    let mut groups = match oracle::analyze_rule(oracle, rule_id, rule, batch, &opts.context) {
        Ok(Some(groups)) => groups,
        Ok(None) => {
            tracing::info!(rule = rule_id, "no result from oracle, skipped");
            return Ok(RuleOutcome::NoResult);
        }
        Err(e) => {
            tracing::error!(rule = rule_id, "oracle invocation failed: {e:#}");
            return Ok(RuleOutcome::Failed);
        }
    };

    let dropped = reconcile(rule_id, &mut groups, instances);
    let result = RuleGroups {
        rule_id: rule_id.to_string(),
        instances: instances.len(),
        analyzed: batch.len(),
        groups,
        label: rule.map(|r| r.label.clone()).filter(|l| !l.is_empty()),
        severity: rule.map(|r| r.severity.clone()).filter(|s| !s.is_empty()),
        dropped,
    };
    emit(&result)?;
    Ok(RuleOutcome::Emitted {
        groups: result.groups.len(),
        dropped: result.dropped.len(),
    })
}
