use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use settings_config::{Config, ValidationSettings};
use settings_model::{
    value_type_name, Document, FieldPath, IssueCode, ValidationIssue, ValidationOutcome,
};
use tracing::{debug, warn};

use crate::context::ValidationContext;
use crate::registry::{CatalogError, CategoryEntry, FieldEntry, Registry};

/// Walks a document against a registry and applies the severity policy.
///
/// Output order is fixed: categories in registration order, fields in
/// declaration order, then the category's document-level rules in
/// registration order.
#[derive(Clone, Debug)]
pub struct Orchestrator {
    registry: Arc<Registry>,
    policy: ValidationSettings,
}

impl Orchestrator {
    pub fn new(registry: Registry) -> Self {
        Orchestrator {
            registry: Arc::new(registry),
            policy: ValidationSettings::default(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, CatalogError> {
        let registry = Registry::from_catalog(&config.catalog)?;
        Ok(Orchestrator::new(registry).with_policy(config.validation.clone()))
    }

    pub fn with_policy(mut self, policy: ValidationSettings) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn policy(&self) -> &ValidationSettings {
        &self.policy
    }

    /// Validate every known category present in `document`.
    pub fn validate_document(&self, document: &Document) -> Vec<ValidationIssue> {
        let issues = self
            .registry
            .categories()
            .flat_map(|category| self.run_category(category, document))
            .collect();
        self.finish(issues)
    }

    /// Validate only the named categories. Unknown names are skipped.
    pub fn validate_categories<S>(&self, document: &Document, categories: &[S]) -> Vec<ValidationIssue>
    where
        S: AsRef<str>,
    {
        let issues = self
            .registry
            .categories()
            .filter(|category| {
                categories
                    .iter()
                    .any(|name| name.as_ref() == category.name())
            })
            .flat_map(|category| self.run_category(category, document))
            .collect();
        self.finish(issues)
    }

    /// Re-run one field's kind check and validator with whole-document context.
    pub fn validate_field(
        &self,
        document: &Document,
        category: &str,
        field: &str,
    ) -> Vec<ValidationIssue> {
        let Some(entry) = self.registry.field(category, field) else {
            debug!(category, field, "validate_field on undeclared field");
            return Vec::new();
        };
        let path = FieldPath::field(category, field);
        let value = document.get(&path).unwrap_or(&Value::Null);
        let issues = self.run_field(entry, &path, value, document).into_issues();
        self.finish(issues)
    }

    /// Validate and split into errors and warnings.
    pub fn outcome(&self, document: &Document) -> ValidationOutcome {
        self.validate_document(document).into_iter().collect()
    }

    fn run_category(&self, category: &CategoryEntry, document: &Document) -> Vec<ValidationIssue> {
        let Some(raw) = document.raw_category(category.name()) else {
            return Vec::new();
        };
        let category_path = FieldPath::category(category.name());
        let Some(record) = raw.as_object() else {
            return vec![ValidationIssue::error(
                category_path,
                IssueCode::Type,
                format!("expected an object, found {}", value_type_name(raw)),
            )];
        };

        let mut issues = Vec::new();
        for field in category.fields() {
            let path = category_path.clone().key(field.name());
            let value = record.get(field.name()).unwrap_or(&Value::Null);
            issues.extend(self.run_field(field, &path, value, document).into_issues());
        }

        let context = ValidationContext::new(document, &category_path);
        for rule in category.rules() {
            let result = catch_unwind(AssertUnwindSafe(|| rule.check(record, &context)));
            match result {
                Ok(found) => issues.extend(found),
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    warn!(rule = rule.name(), %reason, "document rule panicked");
                    issues.push(internal_issue(category_path.clone(), &reason));
                }
            }
        }
        issues
    }

    fn run_field(
        &self,
        field: &FieldEntry,
        path: &FieldPath,
        value: &Value,
        document: &Document,
    ) -> ValidationOutcome {
        if !field.kind().accepts(value) {
            return ValidationOutcome::from_issue(ValidationIssue::error(
                path.clone(),
                IssueCode::Type,
                format!("expected {}, found {}", field.kind(), value_type_name(value)),
            ));
        }

        let Some(validator) = field.validator() else {
            return ValidationOutcome::valid();
        };
        let context = ValidationContext::new(document, path);
        match catch_unwind(AssertUnwindSafe(|| validator.validate(value, &context))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                warn!(path = %path, %reason, "validator panicked");
                ValidationOutcome::from_issue(internal_issue(path.clone(), &reason))
            }
        }
    }

    /// Apply the severity policy, keeping order.
    fn finish(&self, issues: Vec<ValidationIssue>) -> Vec<ValidationIssue> {
        let total = issues.len();
        let issues: Vec<ValidationIssue> = if self.policy.is_empty() {
            issues
        } else {
            issues
                .into_iter()
                .filter_map(|issue| {
                    match self.policy.severity_for_path(&issue.path, issue.code) {
                        None => Some(issue),
                        Some(level) => level
                            .as_severity()
                            .map(|severity| issue.with_severity(severity)),
                    }
                })
                .collect()
        };
        debug!(
            produced = total,
            reported = issues.len(),
            "validation finished"
        );
        issues
    }
}

fn internal_issue(path: FieldPath, reason: &str) -> ValidationIssue {
    ValidationIssue::error(path, IssueCode::Internal, format!("validator panicked: {reason}"))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}
