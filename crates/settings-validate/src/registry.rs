use serde_json::Value;
use settings_model::{CategoryRecord, ValueKind};
use thiserror::Error;

use crate::collection::DocumentRule;
use crate::validator::Validator;

/// Problems found while assembling a registry.
#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("category '{category}' is registered twice")]
    DuplicateCategory { category: String },
    #[error("field '{category}.{field}' is declared twice")]
    DuplicateField { category: String, field: String },
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Declared field: kind, default, and optional validator.
#[derive(Clone, Debug)]
pub struct FieldEntry {
    name: String,
    kind: ValueKind,
    default: Value,
    validator: Option<Validator>,
}

impl FieldEntry {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        let default = if kind.is_collection() {
            Value::Array(Vec::new())
        } else {
            Value::Null
        };
        FieldEntry {
            name: name.into(),
            kind,
            default,
            validator: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = default;
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }
}

/// Known category: its fields in declaration order plus document-level rules.
#[derive(Clone, Debug)]
pub struct CategoryEntry {
    name: String,
    fields: Vec<FieldEntry>,
    rules: Vec<DocumentRule>,
}

impl CategoryEntry {
    pub fn new(name: impl Into<String>) -> Self {
        CategoryEntry {
            name: name.into(),
            fields: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldEntry) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_rule(mut self, rule: DocumentRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldEntry] {
        &self.fields
    }

    pub fn rules(&self) -> &[DocumentRule] {
        &self.rules
    }

    pub fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn is_known_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Record holding every declared field at its default.
    pub fn default_record(&self) -> CategoryRecord {
        self.fields
            .iter()
            .map(|field| (field.name.clone(), field.default.clone()))
            .collect()
    }
}

/// Known categories in registration order.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    categories: Vec<CategoryEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn register(&mut self, category: CategoryEntry) -> Result<(), CatalogError> {
        if self.is_known(&category.name) {
            return Err(CatalogError::DuplicateCategory {
                category: category.name,
            });
        }
        for (idx, field) in category.fields.iter().enumerate() {
            if category.fields[..idx]
                .iter()
                .any(|earlier| earlier.name == field.name)
            {
                return Err(CatalogError::DuplicateField {
                    category: category.name.clone(),
                    field: field.name.clone(),
                });
            }
        }
        self.categories.push(category);
        Ok(())
    }

    pub fn with_category(mut self, category: CategoryEntry) -> Result<Self, CatalogError> {
        self.register(category)?;
        Ok(self)
    }

    pub fn categories(&self) -> impl Iterator<Item = &CategoryEntry> {
        self.categories.iter()
    }

    pub fn category(&self, name: &str) -> Option<&CategoryEntry> {
        self.categories.iter().find(|category| category.name == name)
    }

    pub fn field(&self, category: &str, field: &str) -> Option<&FieldEntry> {
        self.category(category).and_then(|entry| entry.field(field))
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.category(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_duplicate_categories_and_fields() {
        let mut registry = Registry::new();
        registry
            .register(CategoryEntry::new("editor").with_field(FieldEntry::new(
                "tabSize",
                ValueKind::Number,
            )))
            .unwrap();

        assert_eq!(
            registry.register(CategoryEntry::new("editor")),
            Err(CatalogError::DuplicateCategory {
                category: "editor".into()
            })
        );

        let doubled = CategoryEntry::new("git")
            .with_field(FieldEntry::new("gpgKey", ValueKind::String))
            .with_field(FieldEntry::new("gpgKey", ValueKind::String));
        assert!(matches!(
            registry.register(doubled),
            Err(CatalogError::DuplicateField { .. })
        ));
    }

    #[test]
    fn default_record_follows_declaration_order() {
        let category = CategoryEntry::new("editor")
            .with_field(FieldEntry::new("tabSize", ValueKind::Number).with_default(json!(4)))
            .with_field(FieldEntry::new("wordWrap", ValueKind::Boolean))
            .with_field(FieldEntry::new(
                "rulers",
                ValueKind::ArrayOfRecord { key: None },
            ));

        let record = category.default_record();
        assert_eq!(
            record.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["tabSize", "wordWrap", "rulers"]
        );
        assert_eq!(record["tabSize"], json!(4));
        assert_eq!(record["wordWrap"], Value::Null);
        assert_eq!(record["rulers"], json!([]));
    }
}
