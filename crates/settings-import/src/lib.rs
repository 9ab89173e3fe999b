//! Selective import: change analysis, merge planning, and apply.
//!
//! The pipeline is `analyze` → user selection → [`build_plan`] → [`apply`].
//! Planning validates the prospective document and either yields a
//! [`MergePlan`] or rejects with diagnostics; apply consumes the plan.

mod apply;
mod diff;
mod plan;
mod preview;

pub use apply::apply;
pub use diff::{analyze, diff_category, ChangeRecord};
pub use plan::{
    build_plan, prospective_record, MergePlan, MergePlanResult, PlanError, PlannedCategory,
};
pub use preview::preview_category;
