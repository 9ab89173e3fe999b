use serde::Serialize;
use serde_json::Value;
use settings_model::{
    value_type_name, CategoryRecord, Document, FieldPath, IssueCode, MergeMode, Severity,
    ValidationIssue,
};
use settings_validate::{CategoryEntry, Orchestrator};
use thiserror::Error;
use tracing::debug;

use crate::preview::preview_category;

/// Selections the planner refuses to consider at all.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("no categories selected")]
    EmptySelection,
    #[error("category '{category}' is not declared by the catalog")]
    UnknownCategory { category: String },
    #[error("category '{category}' is not present in the imported document")]
    MissingFromCandidate { category: String },
}

/// One category write: the full record that will replace the live one.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlannedCategory {
    pub category_id: String,
    pub mode: MergeMode,
    pub record: CategoryRecord,
}

/// Validated, not yet applied set of category writes.
///
/// Only the planner constructs plans and [`crate::apply`] consumes them.
#[derive(Debug, PartialEq, Serialize)]
pub struct MergePlan {
    entries: Vec<PlannedCategory>,
}

impl MergePlan {
    pub fn entries(&self) -> &[PlannedCategory] {
        &self.entries
    }

    pub fn category_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.category_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unified diffs of each planned record against `live`, skipping no-ops.
    pub fn previews(&self, live: &Document, context: usize) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter_map(|entry| {
                let prospective = Value::Object(entry.record.clone());
                preview_category(
                    &entry.category_id,
                    live.raw_category(&entry.category_id),
                    &prospective,
                    context,
                )
                .map(|diff| (entry.category_id.clone(), diff))
            })
            .collect()
    }

    pub(crate) fn into_entries(self) -> Vec<PlannedCategory> {
        self.entries
    }
}

/// Outcome of planning. A rejected result carries no plan.
#[derive(Debug, PartialEq)]
pub enum MergePlanResult {
    Ready {
        plan: MergePlan,
        warnings: Vec<ValidationIssue>,
    },
    Rejected {
        errors: Vec<ValidationIssue>,
        warnings: Vec<ValidationIssue>,
    },
}

impl MergePlanResult {
    pub fn is_ready(&self) -> bool {
        matches!(self, MergePlanResult::Ready { .. })
    }

    pub fn warnings(&self) -> &[ValidationIssue] {
        match self {
            MergePlanResult::Ready { warnings, .. } | MergePlanResult::Rejected { warnings, .. } => {
                warnings
            }
        }
    }

    pub fn errors(&self) -> &[ValidationIssue] {
        match self {
            MergePlanResult::Ready { .. } => &[],
            MergePlanResult::Rejected { errors, .. } => errors,
        }
    }

    pub fn plan(&self) -> Option<&MergePlan> {
        match self {
            MergePlanResult::Ready { plan, .. } => Some(plan),
            MergePlanResult::Rejected { .. } => None,
        }
    }

    pub fn into_plan(self) -> Option<MergePlan> {
        match self {
            MergePlanResult::Ready { plan, .. } => Some(plan),
            MergePlanResult::Rejected { .. } => None,
        }
    }
}

/// Build a merge plan for `selections`, validating the prospective document.
///
/// Only issues under the selected categories are reported. Neither `live` nor
/// `candidate` is modified.
pub fn build_plan<S>(
    orchestrator: &Orchestrator,
    live: &Document,
    candidate: &Document,
    selections: &[S],
    mode: MergeMode,
) -> Result<MergePlanResult, PlanError>
where
    S: AsRef<str>,
{
    if selections.is_empty() {
        return Err(PlanError::EmptySelection);
    }

    let registry = orchestrator.registry();
    let mut selected: Vec<&str> = Vec::new();
    for name in selections {
        let name = name.as_ref();
        if !registry.is_known(name) {
            return Err(PlanError::UnknownCategory {
                category: name.to_owned(),
            });
        }
        if !candidate.contains_category(name) {
            return Err(PlanError::MissingFromCandidate {
                category: name.to_owned(),
            });
        }
        if !selected.contains(&name) {
            selected.push(name);
        }
    }

    let mut structural = Vec::new();
    let mut entries = Vec::new();
    for category in registry
        .categories()
        .filter(|category| selected.contains(&category.name()))
    {
        let Some(incoming) = candidate.category(category.name()) else {
            let found = candidate
                .raw_category(category.name())
                .map(value_type_name)
                .unwrap_or("nothing");
            structural.push(ValidationIssue::error(
                FieldPath::category(category.name()),
                IssueCode::Type,
                format!("expected an object, found {found}"),
            ));
            continue;
        };
        let record = prospective_record(category, live.category(category.name()), incoming, mode);
        entries.push(PlannedCategory {
            category_id: category.name().to_owned(),
            mode,
            record,
        });
    }

    let prospective = prospective_document(live, &entries);
    let mut errors = structural;
    let mut warnings = Vec::new();
    for issue in orchestrator.validate_categories(&prospective, selected.as_slice()) {
        match issue.severity {
            Severity::Error => errors.push(issue),
            Severity::Warning => warnings.push(issue),
        }
    }

    debug!(
        categories = entries.len(),
        %mode,
        errors = errors.len(),
        warnings = warnings.len(),
        "built merge plan"
    );

    if errors.is_empty() {
        Ok(MergePlanResult::Ready {
            plan: MergePlan { entries },
            warnings,
        })
    } else {
        Ok(MergePlanResult::Rejected { errors, warnings })
    }
}

/// Record a category would hold after import.
///
/// `merge` overlays the declared candidate fields onto the live record.
/// `replace` starts from declared defaults instead. Undeclared candidate
/// fields are dropped; undeclared live fields survive in both modes.
pub fn prospective_record(
    category: &CategoryEntry,
    live: Option<&CategoryRecord>,
    candidate: &CategoryRecord,
    mode: MergeMode,
) -> CategoryRecord {
    let mut record = match (mode, live) {
        (MergeMode::Merge, Some(live)) => live.clone(),
        (MergeMode::Merge, None) | (MergeMode::Replace, _) => category.default_record(),
    };

    for field in category.fields() {
        if let Some(value) = candidate.get(field.name()) {
            record.insert(field.name().to_owned(), value.clone());
        }
    }

    if mode == MergeMode::Replace {
        if let Some(live) = live {
            for (name, value) in live {
                if !category.is_known_field(name) {
                    record.insert(name.clone(), value.clone());
                }
            }
        }
    }
    record
}

pub(crate) fn prospective_document(live: &Document, entries: &[PlannedCategory]) -> Document {
    let mut next = live.clone();
    for entry in entries {
        next.set_category(&entry.category_id, entry.record.clone());
    }
    next
}
