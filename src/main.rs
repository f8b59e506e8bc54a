//! rulegroup CLI binary entry point.
//! Resolves configuration, loads the report and drives the pipeline.

use anyhow::{bail, Context};
use clap::Parser;
use rulegroup::cli::{Cli, Commands};
use rulegroup::config::{self, Backend, CliOverrides, Effective};
use rulegroup::index::RuleIndex;
use rulegroup::models::report::Report;
use rulegroup::oracle::cache::CachedOracle;
use rulegroup::oracle::command::CommandOracle;
use rulegroup::oracle::http::HttpOracle;
use rulegroup::oracle::Oracle;
use rulegroup::pipeline::{self, PipelineOptions};
use rulegroup::{output, utils};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_env("RULEGROUP_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("RULEGROUP_LOG_JSON")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging();
    let result = match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
        Commands::Analyze {
            report,
            repo_root,
            min_instances,
            max_instances,
            output,
            rules,
            no_cache,
        } => {
            let overrides = CliOverrides {
                repo_root,
                min_instances,
                max_instances,
                output,
                no_cache,
            };
            analyze(&report, &overrides, rules)
        }
        Commands::Rank {
            report,
            repo_root,
            min_instances,
            output,
        } => {
            let overrides = CliOverrides {
                repo_root,
                min_instances,
                output,
                ..CliOverrides::default()
            };
            rank(&report, &overrides)
        }
    };
    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", utils::error_prefix(), e);
            std::process::exit(2);
        }
    }
}

fn resolve(overrides: &CliOverrides) -> anyhow::Result<Effective> {
    let eff = config::resolve_effective(overrides)?;
    if !eff.config_found {
        eprintln!(
            "{} No rulegroup.toml found in {}; using defaults.",
            utils::note_prefix(),
            eff.repo_root.to_string_lossy()
        );
    }
    Ok(eff)
}

fn build_oracle(eff: &Effective) -> anyhow::Result<Box<dyn Oracle>> {
    let base: Box<dyn Oracle> = match &eff.backend {
        Backend::Http {
            endpoint,
            model,
            api_key_env,
        } => {
            let key = match std::env::var(api_key_env) {
                Ok(k) if !k.trim().is_empty() => k,
                _ => bail!(
                    "environment variable {} is not set (needed by the http oracle backend)",
                    api_key_env
                ),
            };
            Box::new(HttpOracle::new(
                endpoint.as_str(),
                model.as_str(),
                key,
                eff.timeout,
            )?)
        }
        Backend::Command { command } => {
            Box::new(CommandOracle::new(command.as_str(), eff.repo_root.clone()))
        }
    };
    let oracle: Box<dyn Oracle> = match &eff.cache_dir {
        Some(dir) => Box::new(CachedOracle::new(base, dir.clone())),
        None => base,
    };
    Ok(oracle)
}

fn load_report(path: &str) -> anyhow::Result<Report> {
    let report = Report::load(Path::new(path))?;
    tracing::info!(
        projects = report.projects.len(),
        rules = report.rules.len(),
        instances = report.instance_count(),
        "report loaded"
    );
    Ok(report)
}

fn analyze(report_path: &str, overrides: &CliOverrides, only_rules: Vec<String>) -> anyhow::Result<i32> {
    let eff = resolve(overrides)?;
    let report = load_report(report_path)?;
    let oracle = build_oracle(&eff)?;

    let index = RuleIndex::build(&report.projects);
    for orphan in index.orphans(&report.rules) {
        tracing::warn!(
            rule = orphan,
            instances = index.count(orphan),
            "instances reference a rule missing from the report; not ranked"
        );
    }
    for wanted in &only_rules {
        if !report.rules.contains(wanted) {
            tracing::warn!(rule = %wanted, "requested rule is not in the report");
        }
    }

    let opts = PipelineOptions {
        bounds: eff.bounds,
        context: eff.context.clone(),
        only_rules,
    };
    let summary = pipeline::run(&report, &index, oracle.as_ref(), &opts, |res| {
        output::print_rule(res, &eff.output).context("failed to write output")
    })?;
    tracing::info!(
        ranked = summary.ranked,
        processed = summary.processed,
        skipped = summary.skipped,
        no_result = summary.no_result,
        failed = summary.failed,
        groups = summary.groups,
        dropped_ids = summary.dropped_ids,
        "run complete"
    );
    Ok(if summary.failed > 0 { 1 } else { 0 })
}

fn rank(report_path: &str, overrides: &CliOverrides) -> anyhow::Result<i32> {
    let eff = resolve(overrides)?;
    let report = load_report(report_path)?;
    let index = RuleIndex::build(&report.projects);
    let ranked = index.rank(&report.rules);
    let rows = output::rank_rows(&ranked, &report.rules, &eff.bounds);
    println!("{}", output::render_ranking(&rows, &eff.output)?);
    Ok(0)
}
