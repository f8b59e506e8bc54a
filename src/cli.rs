//! CLI argument parsing via `clap`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rulegroup",
    version,
    about = "Group static-analysis rule violations by root cause",
    long_about = "rulegroup — ranks the rules of a static-analysis report by instance count and asks an analysis oracle to cluster each rule's instances into root-cause groups. Only incident ids present in the report survive into the output.\n\nConfiguration precedence: CLI > rulegroup.toml > defaults.",
    after_help = "Examples:\n  rulegroup rank report.json\n  rulegroup analyze report.json --min-instances 5 --max-instances 50\n  rulegroup analyze report.json --rule Api.0001 --output json",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
/// Supported subcommands.
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current rulegroup version.")]
    Version,
    /// Cluster rule instances by root cause
    #[command(
        about = "Group each rule's instances by root cause",
        long_about = "Process ranked rules one at a time: bound the instance batch, invoke the oracle once, drop unknown incident ids and print the groups.",
        after_help = "Examples:\n  rulegroup analyze report.json\n  rulegroup analyze report.json --no-cache --output human"
    )]
    Analyze {
        #[arg(help = "Path to the report JSON")]
        report: String,
        #[arg(long, help = "Repository root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, help = "Skip rules with fewer instances (default: 10)")]
        min_instances: Option<usize>,
        #[arg(long, help = "Analyze at most this many instances per rule (default: 100)")]
        max_instances: Option<usize>,
        #[arg(long, help = "Output mode: yaml|json|human (default: yaml)")]
        output: Option<String>,
        #[arg(long = "rule", help = "Only process this rule id (repeatable)")]
        rules: Vec<String>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Bypass the oracle cache")]
        no_cache: bool,
    },
    /// List rules by instance count
    #[command(
        about = "Rank rules by instance count",
        long_about = "Print the processing order without invoking the oracle. Rules below --min-instances are marked."
    )]
    Rank {
        #[arg(help = "Path to the report JSON")]
        report: String,
        #[arg(long, help = "Repository root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, help = "Minimum instances to qualify (default: 10)")]
        min_instances: Option<usize>,
        #[arg(long, help = "Output mode: yaml|json|human (default: yaml)")]
        output: Option<String>,
    },
}
