//! Report schema: the static-analysis document consumed by every command.
//!
//! The report is read once, wholesale, and stays read-only afterwards. It is
//! shaped as:
//! - `settings`: opaque tool settings, kept as raw JSON.
//! - `projects`: `{ path, ruleInstances }` entries in document order.
//! - `rules`: a mapping from rule id to rule metadata. Document order is
//!   preserved because ranking ties fall back to it.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
/// Failure to load a report. Always fatal for a run.
pub enum ReportError {
    #[error("cannot read report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("report {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
/// Top-level report document.
pub struct Report {
    #[serde(default)]
    pub settings: Json,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub rules: RuleSet,
}

impl Report {
    /// Read and parse a report file.
    pub fn load(path: &Path) -> Result<Report, ReportError> {
        let text = fs::read_to_string(path).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ReportError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a report held in memory; `origin` only labels errors.
    pub fn from_json_str(text: &str, origin: &str) -> Result<Report, ReportError> {
        serde_json::from_str(text).map_err(|source| ReportError::Parse {
            path: PathBuf::from(origin),
            source,
        })
    }

    pub fn instance_count(&self) -> usize {
        self.projects.iter().map(|p| p.rule_instances.len()).sum()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A project path with its rule instances in report order.
pub struct Project {
    pub path: String,
    #[serde(default)]
    pub rule_instances: Vec<RuleInstance>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Static rule definition.
pub struct Rule {
    /// Filled from the mapping key when loading.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
/// One occurrence of a rule violation.
pub struct RuleInstance {
    pub incident_id: String,
    pub rule_id: String,
    #[serde(default)]
    pub project_path: String,
    #[serde(default)]
    pub state: State,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum State {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Where an instance was found and what code it points at.
pub struct Location {
    #[serde(default)]
    pub kind: LocationKind,
    pub path: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub protected_snippet: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum LocationKind {
    #[default]
    File,
    Binary,
}

#[derive(Debug, Default)]
/// Rule definitions keyed by id, iterable in document order.
pub struct RuleSet {
    rules: Vec<Rule>,
    by_id: HashMap<String, usize>,
}

impl RuleSet {
    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.by_id.get(id).map(|&i| &self.rules[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Add a rule; a repeated id replaces the earlier definition in place.
    pub fn insert(&mut self, mut rule: Rule, id: String) {
        rule.id = id.clone();
        match self.by_id.get(&id) {
            Some(&i) => self.rules[i] = rule,
            None => {
                self.by_id.insert(id, self.rules.len());
                self.rules.push(rule);
            }
        }
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        let mut set = RuleSet::default();
        for rule in iter {
            let id = rule.id.clone();
            set.insert(rule, id);
        }
        set
    }
}

impl<'de> Deserialize<'de> for RuleSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RuleSetVisitor;

        impl<'de> Visitor<'de> for RuleSetVisitor {
            type Value = RuleSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from rule id to rule metadata")
            }

            fn visit_map<A>(self, mut map: A) -> Result<RuleSet, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut set = RuleSet::default();
                while let Some((id, rule)) = map.next_entry::<String, Rule>()? {
                    set.insert(rule, id);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(RuleSetVisitor)
    }
}
