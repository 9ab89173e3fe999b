use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::FieldPath;

/// Machine-readable issue codes. Keep the list in sync with the renderers.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueCode {
    Required,
    Type,
    Min,
    Max,
    Range,
    Pattern,
    Enum,
    Format,
    Dependency,
    Custom,
    Internal,
}

impl IssueCode {
    pub const ALL: &'static [IssueCode] = &[
        IssueCode::Required,
        IssueCode::Type,
        IssueCode::Min,
        IssueCode::Max,
        IssueCode::Range,
        IssueCode::Pattern,
        IssueCode::Enum,
        IssueCode::Format,
        IssueCode::Dependency,
        IssueCode::Custom,
        IssueCode::Internal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IssueCode::Required => "required",
            IssueCode::Type => "type",
            IssueCode::Min => "min",
            IssueCode::Max => "max",
            IssueCode::Range => "range",
            IssueCode::Pattern => "pattern",
            IssueCode::Enum => "enum",
            IssueCode::Format => "format",
            IssueCode::Dependency => "dependency",
            IssueCode::Custom => "custom",
            IssueCode::Internal => "internal",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IssueCode {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        IssueCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == value)
            .ok_or(())
    }
}

/// Whether an issue blocks saving/importing.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            _ => Err(()),
        }
    }
}

/// Single path-addressed validation finding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: FieldPath,
    pub code: IssueCode,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Value>,
}

impl ValidationIssue {
    pub fn new(
        path: FieldPath,
        code: IssueCode,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        ValidationIssue {
            path,
            code,
            severity,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn error(path: FieldPath, code: IssueCode, message: impl Into<String>) -> Self {
        ValidationIssue::new(path, code, Severity::Error, message)
    }

    pub fn warning(path: FieldPath, code: IssueCode, message: impl Into<String>) -> Self {
        ValidationIssue::new(path, code, Severity::Warning, message)
    }

    pub fn with_suggestion(mut self, suggestion: Value) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.severity, self.code, self.path, self.message
        )?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (suggested: {suggestion})")?;
        }
        Ok(())
    }
}

/// Result of running one validator: errors block, warnings never do.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationOutcome {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        ValidationOutcome::default()
    }

    pub fn from_issue(issue: ValidationIssue) -> Self {
        let mut outcome = ValidationOutcome::valid();
        outcome.push(issue);
        outcome
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        match issue.severity {
            Severity::Error => self.errors.push(issue),
            Severity::Warning => self.warnings.push(issue),
        }
    }

    /// Append `other`'s issues after this outcome's, preserving order.
    pub fn merge(&mut self, other: ValidationOutcome) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_blocking(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len() + self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_clean()
    }

    /// Move every issue into `severity`'s bucket.
    pub fn retag(self, severity: Severity) -> Self {
        self.into_issues()
            .into_iter()
            .map(|issue| issue.with_severity(severity))
            .collect()
    }

    /// Flatten into errors followed by warnings.
    pub fn into_issues(self) -> Vec<ValidationIssue> {
        let mut issues = self.errors;
        issues.extend(self.warnings);
        issues
    }
}

impl FromIterator<ValidationIssue> for ValidationOutcome {
    fn from_iter<I: IntoIterator<Item = ValidationIssue>>(iter: I) -> Self {
        let mut outcome = ValidationOutcome::valid();
        for issue in iter {
            outcome.push(issue);
        }
        outcome
    }
}

pub fn has_blocking(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(ValidationIssue::is_error)
}
