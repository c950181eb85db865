use serde::Deserialize;

/// Which optimisation passes the execution planner runs.
///
/// The default is the plain plan: every node kept, cycles removed before
/// leveling. Loadable from host configuration; missing fields take their
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlannerOptions {
    /// Compute each distinct `(field, transform)` column once, before any
    /// condition reads it.
    pub precompute_transforms: bool,
    /// Replace single-child conjunctions and disjunctions by their child.
    pub collapse_single_child: bool,
    /// Merge structurally identical nodes across tags.
    pub deduplicate: bool,
    /// Break dependency cycles instead of failing with a cyclic dependency error.
    pub remove_cycles: bool,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            precompute_transforms: false,
            collapse_single_child: false,
            deduplicate: false,
            remove_cycles: true,
        }
    }
}

impl PlannerOptions {
    /// Every optimisation pass enabled.
    #[must_use]
    pub fn optimized() -> Self {
        Self {
            precompute_transforms: true,
            collapse_single_child: true,
            deduplicate: true,
            remove_cycles: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TaggingOptions {
    /// Strip the run's own tag names from the input tag lists before
    /// evaluating. Tags not defined in the run are always kept.
    pub remove_old_tags: bool,
}

impl Default for TaggingOptions {
    fn default() -> Self {
        Self {
            remove_old_tags: true,
        }
    }
}
