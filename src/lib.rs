//! rulegroup core library.
//!
//! This crate groups the rule instances of a static-analysis report into
//! root-cause clusters with the help of an external analysis oracle, and
//! guarantees that only incident ids present in the report reach the output.
//!
//! High-level modules:
//! - `models`: Report schema, groups and run results.
//! - `index`: ruleId -> instances index and rule ranking.
//! - `batch`: Minimum/maximum instance bounds per rule.
//! - `budget`: Shared token budget across context items.
//! - `oracle`: Request building, backends, frame parsing and caching.
//! - `reconcile`: Validation of oracle groups against the report.
//! - `pipeline`: Sequential per-rule driver.
//! - `output`: yaml/json/human printers.
//! - `config`: Discovery and effective configuration resolution.
//! - `cli`: CLI argument parsing (binary uses this).
//! - `utils`: Supporting helpers.
pub mod batch;
pub mod budget;
pub mod cli;
pub mod config;
pub mod index;
pub mod models;
pub mod oracle;
pub mod output;
pub mod pipeline;
pub mod reconcile;
pub mod utils;
