use settings_config::{CatalogSettings, CategorySpec, FieldSpec, FormatSpec, RuleKind, RuleSpec};
use settings_model::ValueKind;
use tracing::debug;

use crate::collection::{self, DocumentRule};
use crate::combinators::{
    compose, depends_on, email_format, hex_color_format, max_value, min_value, one_of, pattern,
    range, required, url_format,
};
use crate::registry::{CatalogError, CategoryEntry, FieldEntry, Registry};
use crate::validator::Validator;

impl Registry {
    /// Compile declared catalog categories into a registry.
    pub fn from_catalog(catalog: &CatalogSettings) -> Result<Self, CatalogError> {
        let mut registry = Registry::new();
        for category in &catalog.categories {
            registry.register(compile_category(category))?;
        }
        debug!(categories = registry.len(), "compiled settings catalog");
        Ok(registry)
    }
}

fn compile_category(spec: &CategorySpec) -> CategoryEntry {
    let mut category = CategoryEntry::new(spec.name.clone());
    for field in &spec.fields {
        category = category.with_field(compile_field(field));
    }
    for rule in &spec.rules {
        category = category.with_rule(compile_rule(rule));
    }
    category
}

fn compile_field(spec: &FieldSpec) -> FieldEntry {
    let mut validators: Vec<Validator> = Vec::new();

    if spec.required {
        validators.push(required());
    }

    match &spec.kind {
        ValueKind::BoundedNumber {
            min: Some(min),
            max: Some(max),
        } => validators.push(range(*min, *max)),
        ValueKind::BoundedNumber { min: Some(min), .. } => validators.push(min_value(*min)),
        ValueKind::BoundedNumber { max: Some(max), .. } => validators.push(max_value(*max)),
        ValueKind::Enum { values } => validators.push(one_of(values.clone())),
        _ => {}
    }

    if let Some(compiled) = &spec.pattern {
        validators.push(pattern(compiled.regex().clone(), compiled.message.clone()));
    }

    if let Some(format) = spec.format {
        validators.push(match format {
            FormatSpec::Url => url_format(),
            FormatSpec::Email => email_format(),
            FormatSpec::HexColor => hex_color_format(),
        });
    }

    if let Some(dependency) = &spec.dependency {
        validators.push(depends_on(
            dependency.path.clone(),
            dependency.equals.clone(),
            dependency.severity,
            dependency.message.clone(),
        ));
    }

    let entry = FieldEntry::new(spec.name.clone(), spec.kind.clone()).with_default(spec.default.clone());
    match validators.len() {
        0 => entry,
        1 => entry.with_validator(validators.remove(0)),
        _ => entry.with_validator(compose(validators)),
    }
}

fn compile_rule(spec: &RuleSpec) -> DocumentRule {
    let message = spec.message.clone();
    match spec.kind {
        RuleKind::NonEmpty => collection::non_empty(
            spec.field.clone(),
            spec.item_field.clone(),
            spec.severity,
            message,
        ),
        RuleKind::Unique => collection::unique(
            spec.field.clone(),
            spec.item_field.clone(),
            spec.severity,
            message,
        ),
        RuleKind::Reference => collection::reference(
            spec.field.clone(),
            spec.item_field.clone(),
            spec.target.clone().unwrap_or_default(),
            spec.severity,
            message,
        ),
        RuleKind::AtMostOne => collection::at_most_one(
            spec.field.clone(),
            spec.item_field.clone(),
            spec.severity,
            message,
        ),
    }
}
