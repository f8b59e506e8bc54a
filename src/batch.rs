//! Batch selection: which rules are analyzed and with how many instances.
//!
//! Large rules are bounded by deterministic truncation to the first
//! `max_instances` instances in index order. Sampling would slot in here
//! without changing the callers.

use crate::models::report::RuleInstance;

pub const DEFAULT_MIN_INSTANCES: usize = 10;
pub const DEFAULT_MAX_INSTANCES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Inclusive instance thresholds for one run.
pub struct Bounds {
    pub min_instances: usize,
    pub max_instances: usize,
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds {
            min_instances: DEFAULT_MIN_INSTANCES,
            max_instances: DEFAULT_MAX_INSTANCES,
        }
    }
}

impl Bounds {
    pub fn qualifies(&self, count: usize) -> bool {
        count >= self.min_instances
    }
}

/// Working subset for a rule, or `None` when the rule has too few instances.
pub fn select<'a, 'r>(
    instances: &'a [&'r RuleInstance],
    bounds: &Bounds,
) -> Option<&'a [&'r RuleInstance]> {
    if !bounds.qualifies(instances.len()) {
        return None;
    }
    let take = instances.len().min(bounds.max_instances);
    Some(&instances[..take])
}
