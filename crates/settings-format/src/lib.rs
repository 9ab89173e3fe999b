//! Output formatters for settings-engine commands.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use settings_import::{ChangeRecord, MergePlanResult};
use settings_model::{Severity, ValidationIssue};

/// Output format shared by every command.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ReportFormat {
    #[default]
    Plain,
    Json,
}

/// Issues found in one validated document.
#[derive(Clone, Debug, Serialize)]
pub struct ValidationReport {
    pub source: String,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new(source: impl Into<String>, issues: Vec<ValidationIssue>) -> Self {
        ValidationReport {
            source: source.into(),
            issues,
        }
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn is_blocking(&self) -> bool {
        self.error_count() > 0
    }

    fn count(&self, severity: Severity) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity == severity)
            .count()
    }
}

/// Renders reports in the selected format. JSON payloads carry `generated_at`.
#[derive(Clone, Debug)]
pub struct Renderer {
    format: ReportFormat,
    generated_at: Option<DateTime<Utc>>,
}

impl Renderer {
    pub fn new(format: ReportFormat) -> Self {
        Renderer {
            format,
            generated_at: None,
        }
    }

    /// Pin the JSON timestamp instead of reading the clock.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.generated_at = Some(timestamp);
        self
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    pub fn validation(&self, reports: &[ValidationReport]) -> String {
        let errors: usize = reports.iter().map(ValidationReport::error_count).sum();
        let warnings: usize = reports.iter().map(ValidationReport::warning_count).sum();

        match self.format {
            ReportFormat::Json => self.json(json!({
                "documents": reports,
                "summary": {
                    "documents": reports.len(),
                    "errors": errors,
                    "warnings": warnings,
                },
            })),
            ReportFormat::Plain => {
                let mut out = String::new();
                for report in reports {
                    if report.issues.is_empty() {
                        let _ = writeln!(out, "{}: ok", report.source);
                    }
                    for issue in &report.issues {
                        let _ = writeln!(out, "{}: {}", report.source, issue);
                    }
                }
                let _ = writeln!(
                    out,
                    "Checked {}: {}, {}",
                    plural(reports.len(), "document"),
                    plural(errors, "error"),
                    plural(warnings, "warning")
                );
                out
            }
        }
    }

    pub fn changes(&self, source: &str, records: &[ChangeRecord]) -> String {
        match self.format {
            ReportFormat::Json => self.json(json!({
                "source": source,
                "categories": records,
            })),
            ReportFormat::Plain => {
                let mut out = String::new();
                let _ = writeln!(out, "Changes in {source}:");
                if records.is_empty() {
                    let _ = writeln!(out, "  (no known categories)");
                }
                for record in records {
                    let summary = if record.is_noop() {
                        "no changes".to_owned()
                    } else {
                        plural(record.changed_field_count, "change")
                    };
                    let flag = if record.has_structural_errors {
                        " (structural errors)"
                    } else {
                        ""
                    };
                    let _ = writeln!(out, "  {}: {summary}{flag}", record.category_id);
                    for path in &record.changed_fields {
                        let _ = writeln!(out, "    {path}");
                    }
                }
                out
            }
        }
    }

    /// Render a planning result plus optional unified-diff previews.
    pub fn plan(&self, result: &MergePlanResult, previews: &[(String, String)]) -> String {
        match self.format {
            ReportFormat::Json => {
                let payload = match result {
                    MergePlanResult::Ready { plan, warnings } => json!({
                        "status": "ready",
                        "plan": plan.entries(),
                        "warnings": warnings,
                        "previews": previews
                            .iter()
                            .map(|(category, diff)| json!({ "category": category, "diff": diff }))
                            .collect::<Vec<_>>(),
                    }),
                    MergePlanResult::Rejected { errors, warnings } => json!({
                        "status": "rejected",
                        "errors": errors,
                        "warnings": warnings,
                    }),
                };
                self.json(payload)
            }
            ReportFormat::Plain => {
                let mut out = String::new();
                match result {
                    MergePlanResult::Ready { plan, warnings } => {
                        let categories = plan
                            .entries()
                            .iter()
                            .map(|entry| format!("{} ({})", entry.category_id, entry.mode))
                            .collect::<Vec<_>>()
                            .join(", ");
                        let _ = writeln!(out, "Import plan ready: {categories}");
                        write_issues(&mut out, warnings);
                        for (_, diff) in previews {
                            out.push_str(diff);
                            if !diff.ends_with('\n') {
                                out.push('\n');
                            }
                        }
                    }
                    MergePlanResult::Rejected { errors, warnings } => {
                        let _ = writeln!(
                            out,
                            "Import rejected: {}, {}",
                            plural(errors.len(), "error"),
                            plural(warnings.len(), "warning")
                        );
                        write_issues(&mut out, errors);
                        write_issues(&mut out, warnings);
                    }
                }
                out
            }
        }
    }

    /// Nothing differs between the live settings and `source`.
    pub fn up_to_date(&self, source: &str) -> String {
        match self.format {
            ReportFormat::Json => self.json(json!({
                "status": "up-to-date",
                "source": source,
                "plan": [],
            })),
            ReportFormat::Plain => {
                format!("Nothing to import: {source} matches live settings.\n")
            }
        }
    }

    fn json(&self, mut payload: Value) -> String {
        let timestamp = self.generated_at.unwrap_or_else(Utc::now);
        if let Value::Object(map) = &mut payload {
            map.insert(
                "generated_at".into(),
                Value::String(timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
        }
        format!("{payload:#}\n")
    }
}

fn write_issues(out: &mut String, issues: &[ValidationIssue]) {
    for issue in issues {
        let _ = writeln!(out, "  {issue}");
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use settings_model::{FieldPath, IssueCode};

    fn range_issue() -> ValidationIssue {
        ValidationIssue::error(
            FieldPath::field("editor", "tabSize"),
            IssueCode::Range,
            "must be between 1 and 8 (got 20)",
        )
        .with_suggestion(json!(8))
    }

    #[test]
    fn plain_validation_lists_issues_and_summary() {
        let reports = vec![
            ValidationReport::new("a.json", vec![range_issue()]),
            ValidationReport::new("b.json", Vec::new()),
        ];
        let rendered = Renderer::new(ReportFormat::Plain).validation(&reports);
        assert_eq!(
            rendered,
            "a.json: error [range] editor.tabSize: must be between 1 and 8 (got 20) (suggested: 8)\n\
             b.json: ok\n\
             Checked 2 documents: 1 error, 0 warnings\n"
        );
    }

    #[test]
    fn json_validation_is_stamped() {
        let timestamp = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let reports = vec![ValidationReport::new("a.json", vec![range_issue()])];
        let rendered = Renderer::new(ReportFormat::Json)
            .at(timestamp)
            .validation(&reports);

        let value: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["generated_at"], json!("2026-10-19T12:00:00Z"));
        assert_eq!(value["summary"]["errors"], json!(1));
        assert_eq!(value["documents"][0]["issues"][0]["path"], json!("editor.tabSize"));
        assert_eq!(value["documents"][0]["issues"][0]["code"], json!("range"));
        assert_eq!(value["documents"][0]["issues"][0]["suggestion"], json!(8));
    }

    #[test]
    fn plain_changes_mark_noops_and_structural_errors() {
        let records = vec![
            ChangeRecord {
                category_id: "editor".into(),
                changed_field_count: 1,
                changed_fields: vec![FieldPath::field("editor", "tabSize")],
                has_structural_errors: false,
            },
            ChangeRecord {
                category_id: "git".into(),
                changed_field_count: 0,
                changed_fields: Vec::new(),
                has_structural_errors: true,
            },
        ];
        let rendered = Renderer::new(ReportFormat::Plain).changes("team.yaml", &records);
        assert_eq!(
            rendered,
            "Changes in team.yaml:\n  editor: 1 change\n    editor.tabSize\n  git: no changes (structural errors)\n"
        );
    }

    #[test]
    fn rejected_plans_list_errors() {
        let result = MergePlanResult::Rejected {
            errors: vec![range_issue()],
            warnings: Vec::new(),
        };
        let rendered = Renderer::new(ReportFormat::Plain).plan(&result, &[]);
        assert!(rendered.starts_with("Import rejected: 1 error, 0 warnings\n"));
        assert!(rendered.contains("  error [range] editor.tabSize"));

        let json_rendered = Renderer::new(ReportFormat::Json).plan(&result, &[]);
        let value: Value = serde_json::from_str(&json_rendered).unwrap();
        assert_eq!(value["status"], json!("rejected"));
        assert!(value.get("plan").is_none());
    }

    #[test]
    fn up_to_date_follows_the_format() {
        let plain = Renderer::new(ReportFormat::Plain).up_to_date("team.json");
        assert_eq!(plain, "Nothing to import: team.json matches live settings.\n");

        let timestamp = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let rendered = Renderer::new(ReportFormat::Json)
            .at(timestamp)
            .up_to_date("team.json");
        let value: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["status"], json!("up-to-date"));
        assert_eq!(value["plan"], json!([]));
        assert_eq!(value["generated_at"], json!("2026-10-19T12:00:00Z"));
    }
}
