//! Oracle adapter: turns one rule's batch into an analysis request and
//! decodes the answer.
//!
//! The oracle itself is an external capability behind the [`Oracle`] trait.
//! One invocation is made per rule. Backends return the first structured
//! frame found in their response, or `None` when there is no usable frame.
//!
//! Submodules:
//! - `parse`: structured-frame extraction from free-form text.
//! - `cache`: idempotent on-disk cache around any oracle.
//! - `http`: chat-completions backend.
//! - `command`: external-process backend.

pub mod cache;
pub mod command;
pub mod http;
pub mod parse;

use crate::budget;
use crate::models::report::{LocationKind, Rule, RuleInstance};
use crate::models::Group;
use crate::utils::join_segment;
use serde::Serialize;
use serde_json::{json, Value as Json};

/// Cache namespace; bump when the prompt or schema changes shape.
pub const CACHE_NAMESPACE: &str = "rulegroup/root-cause/v1";
pub const DEFAULT_TARGET_DIR: &str = "source";
pub const DEFAULT_MAX_TOKENS: usize = 12_000;
pub const DEFAULT_MIN_ITEM_TOKENS: usize = 48;
pub const CONTEXT_ITEM_NAME: &str = "INCIDENT";

/// External text-analysis capability.
pub trait Oracle {
    /// Stable description of the backend (model, command) used in cache keys.
    fn identity(&self) -> String;

    /// Run one analysis. `Ok(None)` means the response held no usable frame.
    fn analyze(&self, request: &AnalysisRequest) -> anyhow::Result<Option<Json>>;
}

impl<O: Oracle + ?Sized> Oracle for Box<O> {
    fn identity(&self) -> String {
        (**self).identity()
    }

    fn analyze(&self, request: &AnalysisRequest) -> anyhow::Result<Option<Json>> {
        (**self).analyze(request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
/// One rendered instance handed to the oracle.
pub struct ContextItem {
    pub name: String,
    pub file: String,
    pub incident_id: String,
    pub content: String,
    #[serde(skip)]
    pub priority: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
/// Complete request for one rule, after budgeting.
pub struct AnalysisRequest {
    pub namespace: String,
    pub rule_id: String,
    pub prompt: String,
    pub schema: Json,
    pub items: Vec<ContextItem>,
    pub max_tokens: usize,
}

#[derive(Debug, Clone)]
/// How context items are rendered and budgeted.
pub struct ContextOptions {
    pub target_dir: String,
    pub max_tokens: usize,
    pub min_item_tokens: usize,
    pub protected_snippets: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        ContextOptions {
            target_dir: DEFAULT_TARGET_DIR.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            min_item_tokens: DEFAULT_MIN_ITEM_TOKENS,
            protected_snippets: false,
        }
    }
}

/// Declared answer shape: `[{ label, rootCause, incidentIds[] }]`.
pub fn output_schema() -> Json {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "label": { "type": "string" },
                "rootCause": { "type": "string" },
                "incidentIds": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["label", "rootCause", "incidentIds"],
            "additionalProperties": false
        }
    })
}

pub fn task_prompt(rule_id: &str, rule: Option<&Rule>) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!(
        "You are given {} errors reported by a static-analysis tool for rule `{}`.\n",
        CONTEXT_ITEM_NAME, rule_id
    ));
    if let Some(rule) = rule {
        if !rule.label.is_empty() {
            prompt.push_str(&format!("Rule: {}\n", rule.label));
        }
        if !rule.description.is_empty() {
            prompt.push_str(&format!("Description: {}\n", rule.description));
        }
    }
    prompt.push_str(
        "Cluster the errors by their root cause. Give every cluster a short label and a \
         one-sentence root cause, and list the incident ids that belong to it.\n\
         Each error carries its id on an `incident:` line. Use only those ids; never invent, \
         shorten or rewrite an incident id.\n\
         Answer with JSON matching the output schema and nothing else.",
    );
    prompt
}

/// Snippet text with a `line: ` prefix when the line is known.
pub fn render_snippet(inst: &RuleInstance, protected: bool) -> String {
    let snippet = if protected && !inst.location.protected_snippet.is_empty() {
        &inst.location.protected_snippet
    } else {
        &inst.location.snippet
    };
    match inst.location.line {
        Some(line) => format!("{}: {}", line, snippet),
        None => snippet.clone(),
    }
}

/// One item per instance of the batch, in batch order.
pub fn build_context_items(batch: &[&RuleInstance], opts: &ContextOptions) -> Vec<ContextItem> {
    batch
        .iter()
        .map(|inst| ContextItem {
            name: CONTEXT_ITEM_NAME.to_string(),
            file: join_segment(&opts.target_dir, &inst.location.path),
            incident_id: inst.incident_id.clone(),
            content: format!(
                "// incident: {}\n{}",
                inst.incident_id,
                render_snippet(inst, opts.protected_snippets)
            ),
            // binary locations carry little code; they go first when over budget
            priority: match inst.location.kind {
                LocationKind::File => 1,
                LocationKind::Binary => 0,
            },
        })
        .collect()
}

/// Build the budgeted request for one rule.
pub fn build_request(
    rule_id: &str,
    rule: Option<&Rule>,
    batch: &[&RuleInstance],
    opts: &ContextOptions,
) -> AnalysisRequest {
    let items = build_context_items(batch, opts);
    let built = items.len();
    let fitted = budget::fit(items, opts.max_tokens, opts.min_item_tokens);
    if fitted.dropped > 0 || fitted.truncated > 0 {
        tracing::info!(
            rule = rule_id,
            items = built,
            dropped = fitted.dropped,
            truncated = fitted.truncated,
            "context over budget"
        );
    }
    AnalysisRequest {
        namespace: CACHE_NAMESPACE.to_string(),
        rule_id: rule_id.to_string(),
        prompt: task_prompt(rule_id, rule),
        schema: output_schema(),
        items: fitted.items,
        max_tokens: opts.max_tokens,
    }
}

/// Items as fenced blocks, for text-only backends.
pub fn render_items(items: &[ContextItem]) -> String {
    let mut out = String::new();
    for item in items {
        out.push_str(&format!(
            "{}:\n```file={}\n{}\n```\n\n",
            item.name, item.file, item.content
        ));
    }
    out
}

/// Decode a frame into groups. Accepts the declared array or an object
/// wrapping it under `groups`.
pub fn decode_frame(frame: Json) -> Option<Vec<Group>> {
    let groups = match frame {
        arr @ Json::Array(_) => arr,
        Json::Object(mut obj) => obj.remove("groups")?,
        _ => return None,
    };
    serde_json::from_value(groups).ok()
}

/// Invoke the oracle once for a rule; `Ok(None)` when there is no result.
pub fn analyze_rule(
    oracle: &dyn Oracle,
    rule_id: &str,
    rule: Option<&Rule>,
    batch: &[&RuleInstance],
    opts: &ContextOptions,
) -> anyhow::Result<Option<Vec<Group>>> {
    let request = build_request(rule_id, rule, batch, opts);
    let Some(frame) = oracle.analyze(&request)? else {
        return Ok(None);
    };
    match decode_frame(frame) {
        Some(groups) => Ok(Some(groups)),
        None => {
            tracing::warn!(rule = rule_id, "oracle frame does not match the output schema");
            Ok(None)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::index::tests::inst;
    use std::cell::RefCell;

    /// Deterministic oracle: returns a canned frame and records requests.
    pub(crate) struct StubOracle {
        pub frame: Option<Json>,
        pub calls: RefCell<Vec<AnalysisRequest>>,
    }

    impl StubOracle {
        pub(crate) fn new(frame: Option<Json>) -> Self {
            StubOracle {
                frame,
                calls: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl Oracle for StubOracle {
        fn identity(&self) -> String {
            "stub".to_string()
        }

        fn analyze(&self, request: &AnalysisRequest) -> anyhow::Result<Option<Json>> {
            self.calls.borrow_mut().push(request.clone());
            Ok(self.frame.clone())
        }
    }

    #[test]
    fn test_context_item_renders_path_marker_and_line() {
        let mut a = inst("A1", "R1");
        a.location.path = "Web\\Startup.cs".into();
        a.location.line = Some(12);
        let b = inst("A2", "R1");
        let items = build_context_items(&[&a, &b], &ContextOptions::default());
        assert_eq!(items[0].file, "source/Web/Startup.cs");
        assert_eq!(items[0].content, "// incident: A1\n12: call_A1();");
        assert_eq!(items[1].content, "// incident: A2\ncall_A2();");
        assert_eq!(items[0].name, CONTEXT_ITEM_NAME);
    }

    #[test]
    fn test_protected_snippet_is_used_when_requested() {
        let a = inst("A1", "R1");
        let opts = ContextOptions {
            protected_snippets: true,
            ..ContextOptions::default()
        };
        let items = build_context_items(&[&a], &opts);
        assert!(items[0].content.ends_with("call_<redacted>();"));
    }

    #[test]
    fn test_prompt_forbids_invented_ids_and_names_rule() {
        let rule = Rule {
            id: "R1".into(),
            label: "Static configuration".into(),
            ..Rule::default()
        };
        let prompt = task_prompt("R1", Some(&rule));
        assert!(prompt.contains("`R1`"));
        assert!(prompt.contains("Static configuration"));
        assert!(prompt.contains("never invent"));
    }

    #[test]
    fn test_schema_declares_three_fields() {
        let schema = output_schema();
        assert_eq!(schema["type"], "array");
        let props = schema["items"]["properties"].as_object().unwrap();
        let keys: Vec<&str> = props.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["label", "rootCause", "incidentIds"]);
    }

    #[test]
    fn test_decode_frame_accepts_array_or_wrapper() {
        let arr = json!([{"label": "L", "rootCause": "X", "incidentIds": ["a"]}]);
        assert_eq!(decode_frame(arr).unwrap()[0].incident_ids, vec!["a"]);
        let wrapped = json!({"groups": [{"label": "L", "rootCause": "X", "incidentIds": []}]});
        assert_eq!(decode_frame(wrapped).unwrap().len(), 1);
        assert!(decode_frame(json!({"label": "L"})).is_none());
        assert!(decode_frame(json!("text")).is_none());
    }

    #[test]
    fn test_analyze_rule_one_call_and_no_result_passthrough() {
        let a = inst("A1", "R1");
        let stub = StubOracle::new(None);
        let out = analyze_rule(&stub, "R1", None, &[&a], &ContextOptions::default()).unwrap();
        assert!(out.is_none());
        assert_eq!(stub.call_count(), 1);
        assert_eq!(stub.calls.borrow()[0].items.len(), 1);
    }

    #[test]
    fn test_schema_mismatch_is_no_result() {
        let a = inst("A1", "R1");
        let stub = StubOracle::new(Some(json!([{"name": "missing fields"}])));
        let out = analyze_rule(&stub, "R1", None, &[&a], &ContextOptions::default()).unwrap();
        assert!(out.is_none());
    }
}
