use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use settings_config::Config;
use settings_model::{FieldPath, IssueCode, Severity, ValidationOutcome, ValueKind};
use settings_test_support::{document, sample_config, sample_document, SAMPLE_CATALOG};
use settings_validate::{
    conditional, custom, required, CategoryEntry, FieldEntry, Orchestrator, Predicate, Registry,
    ValidationContext,
};

fn orchestrator() -> Orchestrator {
    Orchestrator::from_config(&sample_config()).expect("compile sample catalog")
}

fn paths(issues: &[settings_model::ValidationIssue]) -> Vec<String> {
    issues.iter().map(|issue| issue.path.to_string()).collect()
}

#[test]
fn sample_document_is_clean() {
    let issues = orchestrator().validate_document(&sample_document());
    assert!(issues.is_empty(), "unexpected issues: {issues:?}");
}

#[test]
fn out_of_range_tab_size_reports_one_range_error() {
    let mut doc = sample_document().to_value();
    doc["editor"]["tabSize"] = json!(20);
    let issues = orchestrator().validate_document(&document(doc));

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].path, FieldPath::field("editor", "tabSize"));
    assert_eq!(issues[0].code, IssueCode::Range);
    assert_eq!(issues[0].severity, Severity::Error);
    assert_eq!(issues[0].suggestion, Some(json!(8)));
}

#[test]
fn signing_without_key_is_a_single_warning() {
    let mut doc = sample_document().to_value();
    doc["git"]["signCommits"] = json!(true);
    doc["git"]["gpgKey"] = Value::Null;
    let outcome: ValidationOutcome = orchestrator()
        .validate_document(&document(doc))
        .into_iter()
        .collect();

    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].code, IssueCode::Dependency);
    assert_eq!(outcome.warnings[0].path.to_string(), "git.gpgKey");
}

#[test]
fn kind_mismatch_skips_the_field_validator() {
    let mut doc = sample_document().to_value();
    doc["editor"]["tabSize"] = json!("twenty");
    let issues = orchestrator().validate_document(&document(doc));

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].code, IssueCode::Type);
    assert_eq!(issues[0].message, "expected number, found string");
}

#[test]
fn non_object_category_is_a_type_error() {
    let mut doc = sample_document().to_value();
    doc["appearance"] = json!("dark");
    let issues = orchestrator().validate_document(&document(doc));

    assert_eq!(paths(&issues), vec!["appearance"]);
    assert_eq!(issues[0].code, IssueCode::Type);
}

#[test]
fn unknown_categories_and_fields_are_not_validated() {
    let mut doc = sample_document().to_value();
    doc["plugins"] = json!({ "tabSize": "whatever" });
    doc["editor"]["legacyFlag"] = json!([1, 2, 3]);
    assert!(orchestrator().validate_document(&document(doc)).is_empty());
}

#[test]
fn issues_follow_catalog_then_rule_order() {
    let doc = document(json!({
        "ai": {
            "backends": [
                { "id": "a", "model": "", "isDefault": true },
                { "id": "a", "model": "m", "isDefault": true }
            ],
            "defaultBackend": "zzz",
            "endpoint": "not a url"
        },
        "editor": { "tabSize": 0, "theme": "drak" }
    }));
    let engine = orchestrator();
    let issues = engine.validate_document(&doc);

    assert_eq!(
        paths(&issues),
        vec![
            "editor.tabSize",
            "editor.theme",
            "ai.endpoint",
            "ai.backends[0].model",
            "ai.backends[1].id",
            "ai.defaultBackend",
            "ai.backends[1].isDefault",
        ]
    );

    for _ in 0..5 {
        assert_eq!(engine.validate_document(&doc), issues);
    }
}

#[test]
fn validate_field_uses_whole_document_context() {
    let mut doc = sample_document().to_value();
    doc["git"]["signCommits"] = json!(true);
    let doc = document(doc);
    let engine = orchestrator();

    let issues = engine.validate_field(&doc, "git", "gpgKey");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].code, IssueCode::Dependency);

    assert!(engine.validate_field(&doc, "git", "signCommits").is_empty());
    assert!(engine.validate_field(&doc, "plugins", "experimental").is_empty());
}

#[test]
fn validate_categories_restricts_output() {
    let mut doc = sample_document().to_value();
    doc["editor"]["tabSize"] = json!(99);
    doc["appearance"]["accentColor"] = json!("blue");
    let doc = document(doc);
    let engine = orchestrator();

    let issues = engine.validate_categories(&doc, &["appearance"]);
    assert_eq!(paths(&issues), vec!["appearance.accentColor"]);
    assert_eq!(issues[0].code, IssueCode::Format);
    assert_eq!(engine.validate_document(&doc).len(), 2);
}

#[test]
fn severity_policy_retags_and_drops_but_spares_internal() {
    let config = Config::from_toml_str(&format!(
        r#"{SAMPLE_CATALOG}
[validation.severity]
range = "warning"

[[validation.severity_overrides]]
path = "appearance.*"
codes = {{ format = "ignore" }}
"#
    ))
    .expect("config with policy");
    let engine = Orchestrator::from_config(&config).expect("compile");

    let mut doc = sample_document().to_value();
    doc["editor"]["tabSize"] = json!(20);
    doc["appearance"]["accentColor"] = json!("blue");
    let issues = engine.validate_document(&document(doc));

    assert_eq!(paths(&issues), vec!["editor.tabSize"]);
    assert_eq!(issues[0].severity, Severity::Warning);
}

#[test]
fn panicking_validator_becomes_one_internal_error() {
    let registry = Registry::new()
        .with_category(
            CategoryEntry::new("editor")
                .with_field(
                    FieldEntry::new("tabSize", ValueKind::Number).with_validator(custom(
                        |_, _: &ValidationContext<'_>| panic!("lookup table missing"),
                    )),
                )
                .with_field(FieldEntry::new("theme", ValueKind::String).with_validator(
                    settings_validate::one_of(vec![json!("light"), json!("dark")]),
                )),
        )
        .expect("registry");
    let engine = Orchestrator::new(registry);
    let doc = document(json!({ "editor": { "tabSize": 4, "theme": "neon" } }));

    let issues = engine.validate_document(&doc);
    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].code, IssueCode::Internal);
    assert_eq!(issues[0].path.to_string(), "editor.tabSize");
    assert_eq!(
        issues[0].message,
        "validator panicked: lookup table missing"
    );
    assert_eq!(issues[1].code, IssueCode::Enum);
}

#[test]
fn conditional_rule_reads_another_category() {
    let registry = Registry::new()
        .with_category(
            CategoryEntry::new("git").with_field(FieldEntry::new("signCommits", ValueKind::Boolean)),
        )
        .expect("git")
        .with_category(CategoryEntry::new("appearance").with_field(
            FieldEntry::new("signatureBadge", ValueKind::String).with_validator(conditional(
                Predicate::path_equals("git.signCommits", json!(true)),
                required(),
            )),
        ))
        .expect("appearance");
    let engine = Orchestrator::new(registry);

    let signing = document(json!({
        "git": { "signCommits": true },
        "appearance": { "signatureBadge": "" }
    }));
    let issues = engine.validate_document(&signing);
    assert_eq!(paths(&issues), vec!["appearance.signatureBadge"]);
    assert_eq!(issues[0].code, IssueCode::Required);
    assert_eq!(issues[0].severity, Severity::Error);

    let not_signing = document(json!({
        "git": { "signCommits": false },
        "appearance": { "signatureBadge": "" }
    }));
    assert!(engine.validate_document(&not_signing).is_empty());

    let no_git = document(json!({ "appearance": { "signatureBadge": "" } }));
    assert!(engine.validate_document(&no_git).is_empty());
}
