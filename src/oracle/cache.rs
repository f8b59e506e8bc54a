//! On-disk cache around an oracle.
//!
//! Entries live under the cache directory as `<sha256>.json`. The key covers
//! the namespace, the backend identity, the prompt, the schema and the
//! budgeted items, so identical inputs and bounds never re-invoke the
//! oracle. Only non-empty frames are stored: a "no result" is retried on
//! the next run. Unreadable entries count as misses; failed writes are
//! logged and ignored.

use super::{AnalysisRequest, Oracle};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CACHE_DIR: &str = ".rulegroup/cache";

#[derive(Serialize)]
struct KeyMaterial<'a> {
    namespace: &'a str,
    backend: &'a str,
    prompt: &'a str,
    schema: &'a Json,
    items: &'a [super::ContextItem],
}

#[derive(Serialize, Deserialize)]
struct Entry {
    namespace: String,
    rule_id: String,
    frame: Json,
}

/// Wraps `inner`, answering repeated requests from disk.
pub struct CachedOracle<O> {
    inner: O,
    dir: PathBuf,
}

impl<O: Oracle> CachedOracle<O> {
    pub fn new(inner: O, dir: impl Into<PathBuf>) -> Self {
        CachedOracle {
            inner,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Content key for `request` against this backend.
    pub fn key(&self, request: &AnalysisRequest) -> anyhow::Result<String> {
        let identity = self.inner.identity();
        let material = KeyMaterial {
            namespace: &request.namespace,
            backend: &identity,
            prompt: &request.prompt,
            schema: &request.schema,
            items: &request.items,
        };
        let bytes = serde_json::to_vec(&material).context("failed to encode oracle cache key")?;
        let digest = Sha256::digest(&bytes);
        let mut out = String::with_capacity(64);
        for b in digest {
            let _ = write!(&mut out, "{:02x}", b);
        }
        Ok(out)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn load(&self, key: &str) -> Option<Entry> {
        let text = fs::read_to_string(self.entry_path(key)).ok()?;
        serde_json::from_str(&text).ok()
    }

    fn store(&self, key: &str, entry: &Entry) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        fs::write(&tmp, serde_json::to_vec_pretty(entry)?)?;
        fs::rename(&tmp, self.entry_path(key))?;
        Ok(())
    }
}

impl<O: Oracle> Oracle for CachedOracle<O> {
    fn identity(&self) -> String {
        self.inner.identity()
    }

    fn analyze(&self, request: &AnalysisRequest) -> anyhow::Result<Option<Json>> {
        let key = self.key(request)?;
        if let Some(entry) = self.load(&key) {
            if entry.namespace == request.namespace {
                tracing::debug!(rule = %request.rule_id, key = %key, "oracle cache hit");
                return Ok(Some(entry.frame));
            }
        }
        tracing::debug!(rule = %request.rule_id, key = %key, "oracle cache miss");
        let frame = self.inner.analyze(request)?;
        if let Some(frame) = frame.as_ref() {
            let entry = Entry {
                namespace: request.namespace.clone(),
                rule_id: request.rule_id.clone(),
                frame: frame.clone(),
            };
            if let Err(e) = self.store(&key, &entry) {
                tracing::warn!(rule = %request.rule_id, "oracle cache write failed: {e}");
            }
        }
        Ok(frame)
    }
}
