use serde_json::Value;
use similar::TextDiff;

/// Unified diff of a category record before and after an import, rendered as
/// pretty JSON. Returns `None` when nothing changes.
pub fn preview_category(
    category: &str,
    live_record: Option<&Value>,
    prospective: &Value,
    context: usize,
) -> Option<String> {
    let original = live_record.map(render).unwrap_or_default();
    let modified = render(prospective);
    if original == modified {
        return None;
    }

    let header_old = format!("live/{category}");
    let header_new = format!("import/{category}");
    let diff = TextDiff::from_lines(&original, &modified);
    let rendered = diff
        .unified_diff()
        .context_radius(context)
        .header(&header_old, &header_new)
        .to_string();
    Some(rendered)
}

fn render(value: &Value) -> String {
    format!("{value:#}\n")
}
