//! Configuration discovery and effective settings resolution.
//!
//! rulegroup reads `rulegroup.toml|yaml|yml` from the repository root (or
//! closest ancestor) and merges it with CLI flags to produce an `Effective`
//! config. Defaults:
//! - `minInstances`: 10, `maxInstances`: 100
//! - `output`: `yaml`
//! - `targetDir`: `source`
//! - `context.maxTokens`: 12000, `context.minItemTokens`: 48
//! - `oracle.backend`: `http` against an OpenAI-compatible endpoint
//! - `cache.dir`: `.rulegroup/cache`, `cache.enabled`: true
//!
//! Overrides precedence: CLI > config file > defaults.

use crate::batch::{Bounds, DEFAULT_MAX_INSTANCES, DEFAULT_MIN_INSTANCES};
use crate::oracle::cache::DEFAULT_CACHE_DIR;
use crate::oracle::http::{DEFAULT_API_KEY_ENV, DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::oracle::{ContextOptions, DEFAULT_MAX_TOKENS, DEFAULT_MIN_ITEM_TOKENS, DEFAULT_TARGET_DIR};
use crate::output::OUTPUT_MODES;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("{key} must be at least 1")]
    NotPositive { key: &'static str },
    #[error("unknown output mode `{0}` (expected yaml, json or human)")]
    Output(String),
    #[error("unknown oracle backend `{0}` (expected http or command)")]
    Backend(String),
    #[error("oracle backend `command` needs [oracle].command")]
    MissingCommand,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
/// Context budgeting section under `[context]`.
pub struct ContextCfg {
    pub max_tokens: Option<usize>,
    pub min_item_tokens: Option<usize>,
    pub protected_snippets: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
/// Oracle backend section under `[oracle]`.
pub struct OracleCfg {
    pub backend: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub command: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Cache section under `[cache]`.
pub struct CacheCfg {
    pub dir: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
/// Root configuration loaded from `rulegroup.toml|yaml`.
pub struct RulegroupConfig {
    pub min_instances: Option<usize>,
    pub max_instances: Option<usize>,
    pub output: Option<String>,
    pub target_dir: Option<String>,
    #[serde(default)]
    pub context: Option<ContextCfg>,
    #[serde(default)]
    pub oracle: Option<OracleCfg>,
    #[serde(default)]
    pub cache: Option<CacheCfg>,
}

#[derive(Debug, Default, Clone)]
/// Values supplied on the command line; `None` defers to the config file.
pub struct CliOverrides {
    pub repo_root: Option<String>,
    pub min_instances: Option<usize>,
    pub max_instances: Option<usize>,
    pub output: Option<String>,
    pub no_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Http {
        endpoint: String,
        model: String,
        api_key_env: String,
    },
    Command {
        command: String,
    },
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    pub repo_root: PathBuf,
    pub config_found: bool,
    pub bounds: Bounds,
    pub output: String,
    pub context: ContextOptions,
    pub backend: Backend,
    pub timeout: Option<Duration>,
    pub cache_dir: Option<PathBuf>,
}

/// Walk upward from `start` to detect the repository root.
///
/// Stops when a `rulegroup.toml|yaml|yml` or a `.git` directory is found.
pub fn detect_repo_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if config_path(cur).is_some() || cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

fn config_path(root: &Path) -> Option<PathBuf> {
    ["rulegroup.toml", "rulegroup.yaml", "rulegroup.yml"]
        .iter()
        .map(|name| root.join(name))
        .find(|p| p.exists())
}

/// Load `RulegroupConfig` from `root`, if a config file is present.
pub fn load_config(root: &Path) -> Result<Option<RulegroupConfig>, ConfigError> {
    let Some(path) = config_path(root) else {
        return Ok(None);
    };
    let text = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let parsed: Result<RulegroupConfig, String> = if path.extension().is_some_and(|e| e == "toml") {
        toml::from_str(&text).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(&text).map_err(|e| e.to_string())
    };
    parsed
        .map(Some)
        .map_err(|message| ConfigError::Parse { path, message })
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(cli: &CliOverrides) -> Result<Effective, ConfigError> {
    let start = PathBuf::from(cli.repo_root.as_deref().unwrap_or("."));
    let repo_root = detect_repo_root(&start);
    let loaded = load_config(&repo_root)?;
    let config_found = loaded.is_some();
    let cfg = loaded.unwrap_or_default();

    let min_instances = cli
        .min_instances
        .or(cfg.min_instances)
        .unwrap_or(DEFAULT_MIN_INSTANCES);
    let max_instances = cli
        .max_instances
        .or(cfg.max_instances)
        .unwrap_or(DEFAULT_MAX_INSTANCES);
    if max_instances == 0 {
        return Err(ConfigError::NotPositive {
            key: "maxInstances",
        });
    }

    let output = cli
        .output
        .clone()
        .or(cfg.output)
        .unwrap_or_else(|| "yaml".to_string());
    if !OUTPUT_MODES.contains(&output.as_str()) {
        return Err(ConfigError::Output(output));
    }

    let ctx = cfg.context.unwrap_or_default();
    let context = ContextOptions {
        target_dir: cfg
            .target_dir
            .unwrap_or_else(|| DEFAULT_TARGET_DIR.to_string()),
        max_tokens: ctx.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        min_item_tokens: ctx.min_item_tokens.unwrap_or(DEFAULT_MIN_ITEM_TOKENS),
        protected_snippets: ctx.protected_snippets.unwrap_or(false),
    };
    if context.max_tokens == 0 {
        return Err(ConfigError::NotPositive {
            key: "context.maxTokens",
        });
    }

    let oracle = cfg.oracle.unwrap_or_default();
    let backend = match oracle.backend.as_deref().unwrap_or("http") {
        "http" => Backend::Http {
            endpoint: oracle.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: oracle.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key_env: oracle
                .api_key_env
                .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
        },
        "command" => Backend::Command {
            command: oracle.command.ok_or(ConfigError::MissingCommand)?,
        },
        other => return Err(ConfigError::Backend(other.to_string())),
    };

    let cache = cfg.cache.unwrap_or_default();
    let cache_dir = if cli.no_cache || !cache.enabled.unwrap_or(true) {
        None
    } else {
        Some(repo_root.join(cache.dir.as_deref().unwrap_or(DEFAULT_CACHE_DIR)))
    };

    Ok(Effective {
        repo_root,
        config_found,
        bounds: Bounds {
            min_instances,
            max_instances,
        },
        output,
        context,
        backend,
        timeout: oracle.timeout_secs.map(Duration::from_secs),
        cache_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn at(root: &Path) -> CliOverrides {
        CliOverrides {
            repo_root: root.to_str().map(str::to_string),
            ..CliOverrides::default()
        }
    }

    #[test]
    fn test_defaults_without_config() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let eff = resolve_effective(&at(dir.path())).unwrap();
        assert!(!eff.config_found);
        assert_eq!(eff.bounds, Bounds::default());
        assert_eq!(eff.bounds.min_instances, 10);
        assert_eq!(eff.bounds.max_instances, 100);
        assert_eq!(eff.output, "yaml");
        assert_eq!(eff.context.max_tokens, 12_000);
        assert_eq!(eff.context.target_dir, "source");
        assert!(eff.timeout.is_none());
        assert_eq!(
            eff.cache_dir.as_deref(),
            Some(dir.path().join(".rulegroup/cache").as_path())
        );
        assert!(matches!(eff.backend, Backend::Http { .. }));
    }

    #[test]
    fn test_detect_and_load_toml() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut f = fs::File::create(root.join("rulegroup.toml")).unwrap();
        writeln!(
            f,
            "{}",
            r#"
minInstances = 2
maxInstances = 40
output = "json"
targetDir = "net8.0"
[context]
maxTokens = 8000
protectedSnippets = true
[oracle]
backend = "command"
command = "my-oracle --json"
timeoutSecs = 90
[cache]
enabled = false
    "#
        )
        .unwrap();
        let nested = root.join("a/b");
        fs::create_dir_all(&nested).unwrap();

        let eff = resolve_effective(&at(&nested)).unwrap();
        assert_eq!(eff.repo_root, root);
        assert_eq!(eff.bounds.min_instances, 2);
        assert_eq!(eff.bounds.max_instances, 40);
        assert_eq!(eff.output, "json");
        assert_eq!(eff.context.target_dir, "net8.0");
        assert_eq!(eff.context.max_tokens, 8000);
        assert!(eff.context.protected_snippets);
        assert_eq!(
            eff.backend,
            Backend::Command {
                command: "my-oracle --json".into()
            }
        );
        assert_eq!(eff.timeout, Some(Duration::from_secs(90)));
        assert!(eff.cache_dir.is_none());
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("rulegroup.yaml"),
            "minInstances: 3\noracle:\n  model: local-model\n  endpoint: http://localhost:8080/v1/chat/completions\n",
        )
        .unwrap();
        let eff = resolve_effective(&at(root)).unwrap();
        assert!(eff.config_found);
        assert_eq!(eff.bounds.min_instances, 3);
        match eff.backend {
            Backend::Http { model, endpoint, api_key_env } => {
                assert_eq!(model, "local-model");
                assert_eq!(endpoint, "http://localhost:8080/v1/chat/completions");
                assert_eq!(api_key_env, "OPENAI_API_KEY");
            }
            other => panic!("unexpected backend {:?}", other),
        }
    }

    #[test]
    fn test_cli_takes_precedence() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("rulegroup.toml"),
            "minInstances = 2\nmaxInstances = 40\noutput = \"json\"\n",
        )
        .unwrap();
        let cli = CliOverrides {
            min_instances: Some(5),
            max_instances: Some(7),
            output: Some("human".into()),
            no_cache: true,
            ..at(root)
        };
        let eff = resolve_effective(&cli).unwrap();
        assert_eq!(eff.bounds.min_instances, 5);
        assert_eq!(eff.bounds.max_instances, 7);
        assert_eq!(eff.output, "human");
        assert!(eff.cache_dir.is_none());
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join(".git")).unwrap();
        let zero = CliOverrides {
            max_instances: Some(0),
            ..at(root)
        };
        assert!(matches!(
            resolve_effective(&zero),
            Err(ConfigError::NotPositive { .. })
        ));
        let bad_output = CliOverrides {
            output: Some("xml".into()),
            ..at(root)
        };
        assert!(matches!(
            resolve_effective(&bad_output),
            Err(ConfigError::Output(_))
        ));

        fs::write(root.join("rulegroup.toml"), "[oracle]\nbackend = \"command\"\n").unwrap();
        assert!(matches!(
            resolve_effective(&at(root)),
            Err(ConfigError::MissingCommand)
        ));
        fs::write(root.join("rulegroup.toml"), "minInstances = \"ten\"\n").unwrap();
        assert!(matches!(
            resolve_effective(&at(root)),
            Err(ConfigError::Parse { .. })
        ));
    }
}
