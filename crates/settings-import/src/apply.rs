use settings_model::Document;
use tracing::debug;

use crate::plan::MergePlan;

/// Produce the post-import document. Categories outside the plan are
/// carried over untouched.
pub fn apply(live: &Document, plan: MergePlan) -> Document {
    let mut next = live.clone();
    for entry in plan.into_entries() {
        debug!(category = %entry.category_id, mode = %entry.mode, "applying category");
        next.set_category(&entry.category_id, entry.record);
    }
    next
}
