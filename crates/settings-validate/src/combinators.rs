//! Parametrized validator builders and the combinators that compose them.
//!
//! Builders ignore values they are not responsible for: bound checks skip
//! non-numbers, string checks skip non-strings, and everything except
//! [`required`] treats `null` and `""` as "not set".

use regex::Regex;
use serde_json::Value;
use settings_model::{
    is_empty_value, FieldPath, IssueCode, Severity, ValidationIssue, ValidationOutcome,
};
use strsim::normalized_levenshtein;

use crate::context::ValidationContext;
use crate::registry::CatalogError;
use crate::validator::{Predicate, Validator};

const SUGGESTION_THRESHOLD: f64 = 0.6;

/// Error `required` for `null`, an absent field, or the empty string.
pub fn required() -> Validator {
    Validator::new(|value, context| {
        if is_empty_value(value) {
            ValidationOutcome::from_issue(ValidationIssue::error(
                context.path().clone(),
                IssueCode::Required,
                "is required",
            ))
        } else {
            ValidationOutcome::valid()
        }
    })
}

/// Error `range` outside `[min, max]`, suggesting the clamped value.
pub fn range(min: f64, max: f64) -> Validator {
    Validator::new(move |value, context| {
        let Some(number) = value.as_f64() else {
            return ValidationOutcome::valid();
        };
        if number >= min && number <= max {
            return ValidationOutcome::valid();
        }
        let clamped = if number < min { min } else { max };
        ValidationOutcome::from_issue(
            ValidationIssue::error(
                context.path().clone(),
                IssueCode::Range,
                format!(
                    "must be between {} and {} (got {})",
                    format_number(min),
                    format_number(max),
                    format_number(number)
                ),
            )
            .with_suggestion(number_value(clamped)),
        )
    })
}

/// Error `min` below the bound.
pub fn min_value(min: f64) -> Validator {
    Validator::new(move |value, context| match value.as_f64() {
        Some(number) if number < min => ValidationOutcome::from_issue(
            ValidationIssue::error(
                context.path().clone(),
                IssueCode::Min,
                format!(
                    "must be at least {} (got {})",
                    format_number(min),
                    format_number(number)
                ),
            )
            .with_suggestion(number_value(min)),
        ),
        _ => ValidationOutcome::valid(),
    })
}

/// Error `max` above the bound.
pub fn max_value(max: f64) -> Validator {
    Validator::new(move |value, context| match value.as_f64() {
        Some(number) if number > max => ValidationOutcome::from_issue(
            ValidationIssue::error(
                context.path().clone(),
                IssueCode::Max,
                format!(
                    "must be at most {} (got {})",
                    format_number(max),
                    format_number(number)
                ),
            )
            .with_suggestion(number_value(max)),
        ),
        _ => ValidationOutcome::valid(),
    })
}

/// Error `enum` unless the value equals one of `allowed`.
pub fn one_of(allowed: Vec<Value>) -> Validator {
    Validator::new(move |value, context| {
        if is_empty_value(value) || allowed.contains(value) {
            return ValidationOutcome::valid();
        }
        let listed = allowed
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let mut issue = ValidationIssue::error(
            context.path().clone(),
            IssueCode::Enum,
            format!("must be one of {listed} (got {value})"),
        );
        if let Some(text) = value.as_str() {
            let candidates = allowed.iter().filter_map(Value::as_str);
            if let Some(closest) = closest_match(text, candidates) {
                issue = issue.with_suggestion(Value::String(closest.to_owned()));
            }
        }
        ValidationOutcome::from_issue(issue)
    })
}

/// Error `pattern` when a non-empty string does not match `regex`.
pub fn pattern(regex: Regex, message: Option<String>) -> Validator {
    Validator::new(move |value, context| match value.as_str() {
        Some(text) if !text.is_empty() && !regex.is_match(text) => {
            let message = message
                .clone()
                .unwrap_or_else(|| format!("does not match pattern {}", regex.as_str()));
            ValidationOutcome::from_issue(ValidationIssue::error(
                context.path().clone(),
                IssueCode::Pattern,
                message,
            ))
        }
        _ => ValidationOutcome::valid(),
    })
}

/// Compile `source` and build a [`pattern`] validator.
pub fn try_pattern(source: &str, message: Option<String>) -> Result<Validator, CatalogError> {
    let regex = Regex::new(source).map_err(|err| CatalogError::InvalidPattern {
        pattern: source.to_owned(),
        reason: err.to_string(),
    })?;
    Ok(pattern(regex, message))
}

/// Error `format` unless the string looks like `scheme://host[/rest]`.
pub fn url_format() -> Validator {
    format_check(is_url, "must be a URL such as https://example.com")
}

/// Error `format` unless the string looks like `local@domain.tld`.
pub fn email_format() -> Validator {
    format_check(is_email, "must be an email address")
}

/// Error `format` unless the string is `#rgb`, `#rgba`, `#rrggbb`, or `#rrggbbaa`.
pub fn hex_color_format() -> Validator {
    format_check(is_hex_color, "must be a hex color such as #1e90ff")
}

fn format_check(check: fn(&str) -> bool, message: &'static str) -> Validator {
    Validator::new(move |value, context| match value.as_str() {
        Some(text) if !text.is_empty() && !check(text) => {
            ValidationOutcome::from_issue(ValidationIssue::error(
                context.path().clone(),
                IssueCode::Format,
                message,
            ))
        }
        _ => ValidationOutcome::valid(),
    })
}

/// Run every validator and union the outcomes in insertion order.
pub fn compose<I>(validators: I) -> Validator
where
    I: IntoIterator<Item = Validator>,
{
    let validators: Vec<Validator> = validators.into_iter().collect();
    Validator::new(move |value, context| {
        let mut outcome = ValidationOutcome::valid();
        for validator in &validators {
            outcome.merge(validator.validate(value, context));
        }
        outcome
    })
}

/// Run `validator` only when `predicate` holds for the context.
pub fn conditional(predicate: Predicate, validator: Validator) -> Validator {
    Validator::new(move |value, context| {
        if predicate.holds(context) {
            validator.validate(value, context)
        } else {
            ValidationOutcome::valid()
        }
    })
}

pub fn custom<F>(check: F) -> Validator
where
    F: Fn(&Value, &ValidationContext<'_>) -> ValidationOutcome + Send + Sync + 'static,
{
    Validator::new(check)
}

/// Validator whose failure to run is reported as an `internal` error.
pub fn fallible<F>(check: F) -> Validator
where
    F: Fn(&Value, &ValidationContext<'_>) -> Result<ValidationOutcome, String>
        + Send
        + Sync
        + 'static,
{
    Validator::new(move |value, context| match check(value, context) {
        Ok(outcome) => outcome,
        Err(reason) => ValidationOutcome::from_issue(ValidationIssue::error(
            context.path().clone(),
            IssueCode::Internal,
            format!("validator failed: {reason}"),
        )),
    })
}

/// Re-tag every issue `validator` reports. `internal` issues stay errors.
pub fn with_severity(validator: Validator, severity: Severity) -> Validator {
    Validator::new(move |value, context| {
        validator
            .validate(value, context)
            .into_issues()
            .into_iter()
            .map(|issue| {
                if issue.code == IssueCode::Internal {
                    issue
                } else {
                    issue.with_severity(severity)
                }
            })
            .collect()
    })
}

/// `dependency` issue when the field is unset while `path` equals `expected`.
pub fn depends_on(
    path: FieldPath,
    expected: Value,
    severity: Severity,
    message: Option<String>,
) -> Validator {
    Validator::new(move |value, context| {
        if !is_empty_value(value) || context.get(&path) != Some(&expected) {
            return ValidationOutcome::valid();
        }
        let message = message
            .clone()
            .unwrap_or_else(|| format!("is required when {path} is {expected}"));
        ValidationOutcome::from_issue(ValidationIssue::new(
            context.path().clone(),
            IssueCode::Dependency,
            severity,
            message,
        ))
    })
}

/// Closest candidate by normalised Levenshtein similarity, if close enough.
pub(crate) fn closest_match<'a, I>(needle: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&'a str, f64)> = None;
    for candidate in candidates {
        let score = normalized_levenshtein(needle, candidate);
        if score > SUGGESTION_THRESHOLD && best.map_or(true, |(_, top)| score > top) {
            best = Some((candidate, score));
        }
    }
    best.map(|(candidate, _)| candidate)
}

fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        Value::from(number as i64)
    } else {
        Value::from(number)
    }
}

fn format_number(number: f64) -> String {
    number_value(number).to_string()
}

fn is_url(text: &str) -> bool {
    let Some((scheme, rest)) = text.split_once("://") else {
        return false;
    };
    let mut scheme_chars = scheme.chars();
    let scheme_ok = scheme_chars
        .next()
        .map_or(false, |first| first.is_ascii_alphabetic())
        && scheme_chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    scheme_ok && !host.is_empty() && !text.chars().any(char::is_whitespace)
}

fn is_email(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    let Some((name, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !local.is_empty()
        && !name.is_empty()
        && !tld.is_empty()
        && !domain.contains('@')
        && !text.chars().any(char::is_whitespace)
}

fn is_hex_color(text: &str) -> bool {
    match text.strip_prefix('#') {
        Some(digits) => {
            matches!(digits.len(), 3 | 4 | 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use settings_model::Document;

    fn run(validator: &Validator, value: Value) -> ValidationOutcome {
        let document = Document::new();
        let path = FieldPath::field("editor", "tabSize");
        validator.validate(&value, &ValidationContext::new(&document, &path))
    }

    #[test]
    fn required_rejects_null_and_empty_strings() {
        let validator = required();
        assert!(run(&validator, Value::Null).is_blocking());
        assert!(run(&validator, json!("")).is_blocking());
        assert!(run(&validator, json!(0)).is_clean());
        assert!(run(&validator, json!(false)).is_clean());
    }

    #[test]
    fn range_suggests_clamped_value() {
        let outcome = run(&range(1.0, 8.0), json!(20));
        assert_eq!(outcome.errors.len(), 1);
        let issue = &outcome.errors[0];
        assert_eq!(issue.code, IssueCode::Range);
        assert_eq!(issue.message, "must be between 1 and 8 (got 20)");
        assert_eq!(issue.suggestion, Some(json!(8)));

        assert!(run(&range(1.0, 8.0), json!(8)).is_clean());
        assert_eq!(run(&range(1.0, 8.0), json!(0)).errors[0].suggestion, Some(json!(1)));
    }

    #[test]
    fn single_bounds_use_their_own_codes() {
        assert_eq!(run(&min_value(1.0), json!(0)).errors[0].code, IssueCode::Min);
        assert_eq!(run(&max_value(8.0), json!(9.5)).errors[0].code, IssueCode::Max);
        assert!(run(&max_value(8.0), json!("nine")).is_clean());
    }

    #[test]
    fn one_of_suggests_near_miss() {
        let validator = one_of(vec![json!("light"), json!("dark"), json!("system")]);
        let outcome = run(&validator, json!("drk"));
        assert_eq!(outcome.errors[0].code, IssueCode::Enum);
        assert_eq!(outcome.errors[0].suggestion, Some(json!("dark")));

        let outcome = run(&validator, json!("neon"));
        assert_eq!(outcome.errors[0].suggestion, None);
        assert!(run(&validator, json!("system")).is_clean());
    }

    #[test]
    fn pattern_ignores_empty_strings() {
        let validator = try_pattern("^[0-9A-F]+$", Some("must be hex".into())).unwrap();
        assert!(run(&validator, json!("")).is_clean());
        assert!(run(&validator, json!("ABC123")).is_clean());
        let outcome = run(&validator, json!("xyz"));
        assert_eq!(outcome.errors[0].message, "must be hex");

        assert!(matches!(
            try_pattern("([", None),
            Err(CatalogError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn formats_are_syntactic() {
        assert!(is_url("https://example.com/path?q=1"));
        assert!(is_url("http://localhost:11434"));
        assert!(!is_url("example.com"));
        assert!(!is_url("https://"));
        assert!(!is_url("1http://example.com"));

        assert!(is_email("dev@example.org"));
        assert!(!is_email("dev@example"));
        assert!(!is_email("a@b@c.d"));

        assert!(is_hex_color("#fff"));
        assert!(is_hex_color("#1E90FFcc"));
        assert!(!is_hex_color("1e90ff"));
        assert!(!is_hex_color("#12345"));

        assert!(run(&url_format(), json!("")).is_clean());
        assert_eq!(
            run(&hex_color_format(), json!("blue")).errors[0].code,
            IssueCode::Format
        );
    }

    #[test]
    fn compose_reports_union_in_order() {
        let first = range(1.0, 8.0);
        let second = custom(|_, context| {
            ValidationOutcome::from_issue(ValidationIssue::warning(
                context.path().clone(),
                IssueCode::Custom,
                "odd tab size",
            ))
        });
        let composed = compose([first.clone(), second.clone()]);

        let value = json!(20);
        let outcome = run(&composed, value.clone());
        let mut expected = run(&first, value.clone());
        expected.merge(run(&second, value));
        assert_eq!(outcome, expected);
        assert_eq!(outcome.len(), 2);
    }

    #[test]
    fn conditional_gates_on_predicate() {
        let document = Document::from_value(json!({ "git": { "signCommits": false } })).unwrap();
        let path = FieldPath::field("git", "gpgKey");
        let context = ValidationContext::new(&document, &path);

        let gated = conditional(
            Predicate::sibling_equals("signCommits", json!(true)),
            required(),
        );
        assert!(gated.validate(&Value::Null, &context).is_clean());

        let enabled = Document::from_value(json!({ "git": { "signCommits": true } })).unwrap();
        let context = ValidationContext::new(&enabled, &path);
        assert!(gated.validate(&Value::Null, &context).is_blocking());
    }

    #[test]
    fn depends_on_reports_configured_severity() {
        let document = Document::from_value(json!({
            "git": { "signCommits": true, "gpgKey": null }
        }))
        .unwrap();
        let path = FieldPath::field("git", "gpgKey");
        let context = ValidationContext::new(&document, &path);
        let validator = depends_on(
            FieldPath::field("git", "signCommits"),
            json!(true),
            Severity::Warning,
            None,
        );

        let outcome = validator.validate(&Value::Null, &context);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].code, IssueCode::Dependency);
        assert_eq!(
            outcome.warnings[0].message,
            "is required when git.signCommits is true"
        );
        assert!(validator.validate(&json!("ABCD1234"), &context).is_clean());
    }

    #[test]
    fn fallible_and_with_severity_keep_internal_errors() {
        let broken = fallible(|_, _| Err("lookup table missing".into()));
        let softened = with_severity(broken, Severity::Warning);
        let outcome = run(&softened, json!(1));
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].code, IssueCode::Internal);

        let softened = with_severity(range(1.0, 8.0), Severity::Warning);
        let outcome = run(&softened, json!(20));
        assert!(!outcome.is_blocking());
        assert_eq!(outcome.warnings[0].code, IssueCode::Range);
    }
}
