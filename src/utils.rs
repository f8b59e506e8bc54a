//! Console prefixes and small text helpers.

use owo_colors::OwoColorize;

pub fn use_colors(output: &str) -> bool {
    output == "human" && std::env::var_os("NO_COLOR").is_none()
}

fn stderr_colors() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

pub fn error_prefix() -> String {
    if stderr_colors() {
        "error:".red().bold().to_string()
    } else {
        "error:".to_string()
    }
}

pub fn note_prefix() -> String {
    if stderr_colors() {
        "note:".cyan().bold().to_string()
    } else {
        "note:".to_string()
    }
}

/// Rough token estimate used by the context budget (4 chars per unit).
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Unicode-safe prefix of at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Join a fixed directory segment and a report path with forward slashes,
/// independent of the host platform.
pub fn join_segment(segment: &str, path: &str) -> String {
    let seg = segment.trim_end_matches(['/', '\\']);
    let rel = path.replace('\\', "/");
    let rel = rel.trim_start_matches('/');
    if seg.is_empty() {
        rel.to_string()
    } else {
        format!("{}/{}", seg, rel)
    }
}
