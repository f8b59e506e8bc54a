//! Flex context budget.
//!
//! All context items share one global cap instead of a fixed per-item
//! allowance. When the items fit, they pass through untouched. Otherwise:
//! 1. Items are taken in priority order (earlier items on ties) while the
//!    sum of their floors fits the cap; the rest are dropped. An item's
//!    floor covers its framing and the leading marker line and is at
//!    least `min_item` units.
//! 2. The units left above the floors are water-filled over the
//!    survivors, smallest need first. Items that still do not fit whole
//!    keep their marker line and have the remaining body truncated.
//!
//! The rendered total never exceeds the cap. Item order in the output
//! matches the input order.

use crate::oracle::ContextItem;
use crate::utils::{estimate_tokens, truncate_chars};

/// Fixed per-item framing cost (fence, name, file attribute).
pub const ITEM_OVERHEAD: usize = 8;
const TRUNCATION_MARKER: &str = "\n[truncated]";

#[derive(Debug)]
pub struct Budgeted {
    pub items: Vec<ContextItem>,
    pub dropped: usize,
    pub truncated: usize,
}

/// Units an item occupies in the rendered request.
pub fn item_cost(item: &ContextItem) -> usize {
    framing_cost(item) + estimate_tokens(&item.content)
}

fn framing_cost(item: &ContextItem) -> usize {
    ITEM_OVERHEAD + estimate_tokens(&item.name) + estimate_tokens(&item.file)
}

/// Leading marker line of the content (newline included) and the body after it.
fn split_marker(content: &str) -> (&str, &str) {
    match content.find('\n') {
        Some(nl) => content.split_at(nl + 1),
        None => (content, ""),
    }
}

/// Units that survive any truncation: framing, marker line and the
/// truncation marker.
fn pinned_cost(item: &ContextItem) -> usize {
    let (marker, _) = split_marker(&item.content);
    framing_cost(item) + estimate_tokens(marker) + estimate_tokens(TRUNCATION_MARKER)
}

fn floor_cost(item: &ContextItem, min_item: usize) -> usize {
    item_cost(item).min(min_item.max(pinned_cost(item)))
}

/// Fit `items` into `cap` units; never fails.
pub fn fit(items: Vec<ContextItem>, cap: usize, min_item: usize) -> Budgeted {
    let total: usize = items.iter().map(item_cost).sum();
    if total <= cap {
        return Budgeted {
            items,
            dropped: 0,
            truncated: 0,
        };
    }

    let min_item = min_item.max(1);
    let floors: Vec<usize> = items.iter().map(|it| floor_cost(it, min_item)).collect();

    // Highest priority first; earlier items win ties.
    let mut by_priority: Vec<usize> = (0..items.len()).collect();
    by_priority.sort_by(|&a, &b| items[b].priority.cmp(&items[a].priority).then(a.cmp(&b)));
    let mut keep = vec![false; items.len()];
    let mut reserved = 0;
    for &i in &by_priority {
        if reserved + floors[i] > cap {
            break;
        }
        reserved += floors[i];
        keep[i] = true;
    }
    let kept = keep.iter().filter(|k| **k).count();
    let dropped = items.len() - kept;

    let mut allot = floors.clone();
    let mut pending: Vec<usize> = (0..items.len())
        .filter(|&i| keep[i] && item_cost(&items[i]) > floors[i])
        .collect();
    pending.sort_by_key(|&i| (item_cost(&items[i]) - floors[i], i));
    let mut remaining = cap - reserved;
    let n = pending.len();
    for (k, &i) in pending.iter().enumerate() {
        let need = item_cost(&items[i]) - floors[i];
        let extra = need.min(remaining / (n - k));
        allot[i] += extra;
        remaining -= extra;
    }

    let mut truncated = 0;
    let mut out = Vec::with_capacity(kept);
    for (i, mut item) in items.into_iter().enumerate() {
        if !keep[i] {
            continue;
        }
        if allot[i] < item_cost(&item) {
            // allot >= pinned here, since a truncated item's floor is at least pinned
            let body_units = allot[i] - pinned_cost(&item);
            let (marker, body) = split_marker(&item.content);
            let mut content = String::with_capacity(marker.len() + body_units * 4 + TRUNCATION_MARKER.len());
            content.push_str(marker);
            content.push_str(truncate_chars(body, body_units * 4));
            content.push_str(TRUNCATION_MARKER);
            item.content = content;
            truncated += 1;
        }
        out.push(item);
    }

    Budgeted {
        items: out,
        dropped,
        truncated,
    }
}
#[cfg(test)]
mod tests {
    use super::*;

    fn item_at(id: &str, file: String, chars: usize, priority: u32) -> ContextItem {
        ContextItem {
            name: "INCIDENT".into(),
            file,
            incident_id: id.into(),
            content: format!("// incident: {}\n{}", id, "x".repeat(chars)),
            priority,
        }
    }

    fn item(id: &str, chars: usize, priority: u32) -> ContextItem {
        item_at(id, format!("source/{}.cs", id), chars, priority)
    }

    fn total(out: &Budgeted) -> usize {
        out.items.iter().map(item_cost).sum()
    }

    #[test]
    fn test_items_within_cap_pass_through() {
        let items = vec![item("a", 40, 1), item("b", 40, 1)];
        let out = fit(items, 12_000, 48);
        assert_eq!(out.items.len(), 2);
        assert_eq!(out.dropped, 0);
        assert_eq!(out.truncated, 0);
        assert!(out.items[0].content.ends_with(&"x".repeat(40)));
    }

    #[test]
    fn test_large_item_is_truncated_small_items_kept_whole() {
        let items = vec![item("a", 40, 1), item("big", 4_000, 1), item("c", 40, 1)];
        let out = fit(items, 300, 20);
        assert_eq!(out.dropped, 0);
        assert_eq!(out.truncated, 1);
        let ids: Vec<&str> = out.items.iter().map(|i| i.incident_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "big", "c"]);
        assert!(out.items[0].content.ends_with(&"x".repeat(40)));
        assert!(out.items[1].content.starts_with("// incident: big\n"));
        assert!(out.items[1].content.ends_with("[truncated]"));
        assert!(total(&out) <= 300, "total {} exceeds cap", total(&out));
    }

    #[test]
    fn test_lowest_priority_dropped_first() {
        let items = vec![
            item("a", 400, 1),
            item("bin", 400, 0),
            item("b", 400, 1),
            item("c", 400, 1),
        ];
        // room for three items at the floor
        let out = fit(items, 150, 50);
        assert_eq!(out.dropped, 1);
        let ids: Vec<&str> = out.items.iter().map(|i| i.incident_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(total(&out) <= 150);
    }

    #[test]
    fn test_ties_drop_later_items() {
        let items = vec![item("a", 400, 1), item("b", 400, 1), item("c", 400, 1)];
        let out = fit(items, 100, 50);
        let ids: Vec<&str> = out.items.iter().map(|i| i.incident_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_long_paths_respect_cap_and_keep_marker() {
        let long = |id: &str| format!("source/{}/{}.cs", "d".repeat(400), id);
        let items = vec![
            item_at("a", long("a"), 400, 1),
            item_at("b", long("b"), 400, 1),
            item_at("c", long("c"), 400, 1),
        ];
        let out = fit(items, 150, 50);
        assert!(total(&out) <= 150, "total {} exceeds cap", total(&out));
        assert!(!out.items.is_empty());
        assert_eq!(out.dropped + out.items.len(), 3);
        for it in &out.items {
            assert!(
                it.content.starts_with(&format!("// incident: {}\n", it.incident_id)),
                "marker lost: {:?}",
                it.content
            );
        }
    }

    #[test]
    fn test_nothing_fits_yields_no_items() {
        let items = vec![item_at("a", "p".repeat(800), 10, 1)];
        let out = fit(items, 50, 10);
        assert!(out.items.is_empty());
        assert_eq!(out.dropped, 1);
    }
}
