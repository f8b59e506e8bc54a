//! Output rendering for `analyze` and `rank`.
//!
//! Supports `yaml` (default), `json` and `human`. The structured modes emit
//! one self-contained document per processed rule, so output can be
//! consumed while the run is still going. Key order is fixed by the model
//! structs and group/id order is the reconciled order.

use crate::batch::Bounds;
use crate::index::RankedRule;
use crate::models::report::RuleSet;
use crate::models::RuleGroups;
use crate::utils::use_colors;
use anyhow::bail;
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::Value as JsonVal;
use std::io::Write;

pub const OUTPUT_MODES: &[&str] = &["yaml", "json", "human"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
/// One row of the `rank` listing.
pub struct RankRow {
    pub rule_id: String,
    pub count: usize,
    pub label: String,
    pub severity: String,
    pub qualifies: bool,
}

/// Compose the JSON document for one rule (pure).
pub fn compose_rule_json(res: &RuleGroups) -> anyhow::Result<JsonVal> {
    Ok(serde_json::to_value(res)?)
}

/// Render one rule's result in the requested mode (pure).
pub fn render_rule(res: &RuleGroups, output: &str) -> anyhow::Result<String> {
    match output {
        "json" => Ok(serde_json::to_string_pretty(&compose_rule_json(res)?)?),
        "yaml" => Ok(format!("---\n{}", serde_yaml::to_string(res)?.trim_end())),
        "human" => Ok(render_rule_human(res, use_colors(output))),
        other => bail!("unknown output mode `{}`", other),
    }
}

fn render_rule_human(res: &RuleGroups, color: bool) -> String {
    let mut lines = Vec::new();
    let mut title = res.rule_id.clone();
    if let Some(severity) = res.severity.as_deref() {
        title.push_str(&format!(" [{}]", severity));
    }
    if let Some(label) = res.label.as_deref() {
        title.push_str(&format!(" ❲{}❳", label));
    }
    let stats = format!(
        "{} group(s), analyzed {} of {} instance(s)",
        res.groups.len(),
        res.analyzed,
        res.instances
    );
    if color {
        lines.push(format!("{} {} — {}", "◆".blue(), title.bold(), stats));
    } else {
        lines.push(format!("◆ {} — {}", title, stats));
    }
    for g in &res.groups {
        let label = if color {
            g.label.clone().green().bold().to_string()
        } else {
            g.label.clone()
        };
        lines.push(format!("  ▸ {} — {}", label, g.root_cause));
        if g.incident_ids.is_empty() {
            lines.push("    (no known incidents)".to_string());
        } else {
            lines.push(format!("    {}", g.incident_ids.join(", ")));
        }
    }
    if !res.dropped.is_empty() {
        let note = format!("  ▲ dropped {} unknown incident id(s)", res.dropped.len());
        if color {
            lines.push(note.yellow().to_string());
        } else {
            lines.push(note);
        }
    }
    lines.join("\n")
}

/// Print one rule's result to stdout.
pub fn print_rule(res: &RuleGroups, output: &str) -> anyhow::Result<()> {
    let text = render_rule(res, output)?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", text)?;
    out.flush()?;
    Ok(())
}

pub fn rank_rows(ranked: &[RankedRule<'_>], rules: &RuleSet, bounds: &Bounds) -> Vec<RankRow> {
    ranked
        .iter()
        .map(|r| {
            let rule = rules.get(r.rule_id);
            RankRow {
                rule_id: r.rule_id.to_string(),
                count: r.count,
                label: rule.map(|x| x.label.clone()).unwrap_or_default(),
                severity: rule.map(|x| x.severity.clone()).unwrap_or_default(),
                qualifies: bounds.qualifies(r.count),
            }
        })
        .collect()
}

/// Render the ranking listing (pure).
pub fn render_ranking(rows: &[RankRow], output: &str) -> anyhow::Result<String> {
    match output {
        "json" => Ok(serde_json::to_string_pretty(rows)?),
        "yaml" => Ok(serde_yaml::to_string(rows)?.trim_end().to_string()),
        "human" => {
            let color = use_colors(output);
            let lines: Vec<String> = rows
                .iter()
                .map(|row| {
                    let count = format!("{:>6}", row.count);
                    let count = if !color {
                        count
                    } else if row.qualifies {
                        count.bold().to_string()
                    } else {
                        count.bright_black().to_string()
                    };
                    let mut line = format!("{} {}", count, row.rule_id);
                    if !row.severity.is_empty() {
                        line.push_str(&format!(" [{}]", row.severity));
                    }
                    if !row.label.is_empty() {
                        line.push_str(&format!(" — {}", row.label));
                    }
                    line
                })
                .collect();
            Ok(lines.join("\n"))
        }
        other => bail!("unknown output mode `{}`", other),
    }
}
