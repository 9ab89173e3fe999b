//! Document-level rules over a whole category record, typically over an
//! array-of-record field such as a list of backends.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use settings_model::{
    is_empty_value, CategoryRecord, FieldPath, IssueCode, Severity, ValidationIssue,
};

use crate::combinators::closest_match;
use crate::context::ValidationContext;

type RuleFn = dyn Fn(&CategoryRecord, &ValidationContext<'_>) -> Vec<ValidationIssue> + Send + Sync;

/// Named rule run after every field of a category has been validated.
#[derive(Clone)]
pub struct DocumentRule {
    name: String,
    check: Arc<RuleFn>,
}

impl DocumentRule {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&CategoryRecord, &ValidationContext<'_>) -> Vec<ValidationIssue>
            + Send
            + Sync
            + 'static,
    {
        DocumentRule {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `context.path()` addresses the category record.
    pub fn check(
        &self,
        record: &CategoryRecord,
        context: &ValidationContext<'_>,
    ) -> Vec<ValidationIssue> {
        (self.check)(record, context)
    }
}

impl fmt::Debug for DocumentRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentRule")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn entries<'r>(record: &'r CategoryRecord, field: &str) -> impl Iterator<Item = (usize, &'r Value)> {
    record
        .get(field)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .enumerate()
}

fn item_path(context: &ValidationContext<'_>, field: &str, index: usize, item_field: &str) -> FieldPath {
    context.path().clone().key(field).index(index).key(item_field)
}

/// Every entry of `field` carries a non-empty `item_field`.
pub fn non_empty(
    field: impl Into<String>,
    item_field: impl Into<String>,
    severity: Severity,
    message: Option<String>,
) -> DocumentRule {
    let field = field.into();
    let item_field = item_field.into();
    let name = format!("{field}[].{item_field} non-empty");
    DocumentRule::new(name, move |record, context| {
        entries(record, &field)
            .filter(|(_, entry)| {
                entry
                    .get(&item_field)
                    .map_or(true, is_empty_value)
            })
            .map(|(index, _)| {
                ValidationIssue::new(
                    item_path(context, &field, index, &item_field),
                    IssueCode::Custom,
                    severity,
                    message
                        .clone()
                        .unwrap_or_else(|| "must not be empty".to_owned()),
                )
            })
            .collect()
    })
}

/// `item_field` values are unique across the entries of `field`.
pub fn unique(
    field: impl Into<String>,
    item_field: impl Into<String>,
    severity: Severity,
    message: Option<String>,
) -> DocumentRule {
    let field = field.into();
    let item_field = item_field.into();
    let name = format!("{field}[].{item_field} unique");
    DocumentRule::new(name, move |record, context| {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut issues = Vec::new();
        for (index, entry) in entries(record, &field) {
            let Some(value) = entry.get(&item_field).filter(|value| !is_empty_value(value)) else {
                continue;
            };
            let key = value.to_string();
            match seen.get(&key) {
                Some(first) => issues.push(ValidationIssue::new(
                    item_path(context, &field, index, &item_field),
                    IssueCode::Custom,
                    severity,
                    message.clone().unwrap_or_else(|| {
                        format!("duplicate value {value} (first used by entry {first})")
                    }),
                )),
                None => {
                    seen.insert(key, index);
                }
            }
        }
        issues
    })
}

/// Scalar field `target` names an entry of `field` by its `item_field`.
/// An unset target is accepted.
pub fn reference(
    field: impl Into<String>,
    item_field: impl Into<String>,
    target: impl Into<String>,
    severity: Severity,
    message: Option<String>,
) -> DocumentRule {
    let field = field.into();
    let item_field = item_field.into();
    let target = target.into();
    let name = format!("{target} references {field}[].{item_field}");
    DocumentRule::new(name, move |record, context| {
        let Some(wanted) = record.get(&target).filter(|value| !is_empty_value(value)) else {
            return Vec::new();
        };
        let known: Vec<&Value> = entries(record, &field)
            .filter_map(|(_, entry)| entry.get(&item_field))
            .collect();
        if known.contains(&wanted) {
            return Vec::new();
        }

        let mut issue = ValidationIssue::new(
            context.path().clone().key(target.as_str()),
            IssueCode::Custom,
            severity,
            message
                .clone()
                .unwrap_or_else(|| format!("{wanted} does not match any {field} {item_field}")),
        );
        if let Some(text) = wanted.as_str() {
            if let Some(closest) = closest_match(text, known.iter().filter_map(|v| v.as_str())) {
                issue = issue.with_suggestion(Value::String(closest.to_owned()));
            }
        }
        vec![issue]
    })
}

/// At most one entry of `field` has `item_field == true`.
pub fn at_most_one(
    field: impl Into<String>,
    item_field: impl Into<String>,
    severity: Severity,
    message: Option<String>,
) -> DocumentRule {
    let field = field.into();
    let item_field = item_field.into();
    let name = format!("{field}[].{item_field} at most one");
    DocumentRule::new(name, move |record, context| {
        entries(record, &field)
            .filter(|(_, entry)| entry.get(&item_field) == Some(&Value::Bool(true)))
            .skip(1)
            .map(|(index, _)| {
                ValidationIssue::new(
                    item_path(context, &field, index, &item_field),
                    IssueCode::Custom,
                    severity,
                    message
                        .clone()
                        .unwrap_or_else(|| format!("only one {field} entry may set {item_field}")),
                )
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use settings_model::Document;

    fn check(rule: &DocumentRule, document: &Document) -> Vec<ValidationIssue> {
        let path = FieldPath::category("ai");
        let context = ValidationContext::new(document, &path);
        let record = document.category("ai").expect("ai category");
        rule.check(record, &context)
    }

    fn backends() -> Document {
        Document::from_value(json!({
            "ai": {
                "backends": [
                    { "id": "local", "model": "llama3", "isDefault": true },
                    { "id": "cloud", "model": "", "isDefault": true },
                    { "id": "local", "model": "mistral" }
                ],
                "defaultBackend": "clod"
            }
        }))
        .unwrap()
    }

    #[test]
    fn non_empty_flags_blank_entries() {
        let issues = check(&non_empty("backends", "model", Severity::Error, None), &backends());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path.to_string(), "ai.backends[1].model");
        assert_eq!(issues[0].code, IssueCode::Custom);
    }

    #[test]
    fn unique_flags_later_duplicates() {
        let issues = check(&unique("backends", "id", Severity::Error, None), &backends());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path.to_string(), "ai.backends[2].id");
        assert_eq!(
            issues[0].message,
            "duplicate value \"local\" (first used by entry 0)"
        );
    }

    #[test]
    fn reference_suggests_existing_entry() {
        let rule = reference("backends", "id", "defaultBackend", Severity::Error, None);
        let issues = check(&rule, &backends());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path.to_string(), "ai.defaultBackend");
        assert_eq!(issues[0].suggestion, Some(json!("cloud")));
    }

    #[test]
    fn at_most_one_reports_each_extra_entry() {
        let rule = at_most_one("backends", "isDefault", Severity::Warning, None);
        let issues = check(&rule, &backends());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path.to_string(), "ai.backends[1].isDefault");
        assert_eq!(issues[0].severity, Severity::Warning);
    }

    #[test]
    fn missing_collection_is_not_an_error() {
        let document = Document::from_value(json!({ "ai": {} })).unwrap();
        assert!(check(&non_empty("backends", "model", Severity::Error, None), &document).is_empty());
        let rule = reference("backends", "id", "defaultBackend", Severity::Error, None);
        assert!(check(&rule, &document).is_empty());
    }
}
