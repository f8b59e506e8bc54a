//! Structured-frame extraction from free-form oracle output.
//!
//! Candidates are tried in order: the raw text, the body of a markdown
//! fence, then balanced JSON values embedded in the text. The first
//! candidate that parses as a JSON array or object is the frame.

use serde_json::Value as Json;

const MAX_EMBEDDED_CANDIDATES: usize = 8;
/// Opening brackets tried as candidate starts; each try scans to the end.
const MAX_EMBEDDED_STARTS: usize = 64;

fn push_unique(candidates: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return;
    }
    if !candidates.iter().any(|c| c == trimmed) {
        candidates.push(trimmed.to_string());
    }
}

fn strip_markdown_fence(content: &str) -> Option<&str> {
    let trimmed = content.trim();
    let rest = trimmed.strip_prefix("```")?;
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    let end = body.rfind("```")?;
    Some(body[..end].trim())
}

/// Balanced `{...}` or `[...]` starting at byte `start`, string-aware.
fn balanced_from(content: &str, start: usize) -> Option<&str> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in content[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(ch) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(&content[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn embedded_candidates(content: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let starts = content
        .char_indices()
        .filter(|&(_, ch)| ch == '{' || ch == '[')
        .take(MAX_EMBEDDED_STARTS);
    for (idx, _) in starts {
        if let Some(found) = balanced_from(content, idx) {
            out.push(found);
            if out.len() >= MAX_EMBEDDED_CANDIDATES {
                break;
            }
        }
    }
    out
}

/// First structured frame in `content`, if any.
pub fn first_frame(content: &str) -> Option<Json> {
    let mut candidates = Vec::new();
    push_unique(&mut candidates, content);
    if let Some(body) = strip_markdown_fence(content) {
        push_unique(&mut candidates, body);
    }
    for found in embedded_candidates(content) {
        push_unique(&mut candidates, found);
    }
    candidates.iter().find_map(|c| match serde_json::from_str::<Json>(c) {
        Ok(v @ (Json::Array(_) | Json::Object(_))) => Some(v),
        _ => None,
    })
}
