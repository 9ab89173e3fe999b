use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use settings_model::{Document, FieldPath, ValueKind};
use settings_validate::{CategoryEntry, Registry};
use tracing::debug;

/// Per-category change summary between the live record and a candidate.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChangeRecord {
    pub category_id: String,
    pub changed_field_count: usize,
    /// Changed fields. Keyed array entries are addressed by candidate index,
    /// or by live index when the entry was removed.
    pub changed_fields: Vec<FieldPath>,
    pub has_structural_errors: bool,
}

impl ChangeRecord {
    /// No field would change; such categories start unselected.
    pub fn is_noop(&self) -> bool {
        self.changed_field_count == 0
    }
}

/// Compare the declared fields of one category.
///
/// Fields absent from the candidate are not changes. Undeclared fields are
/// ignored. A missing live record compares as an empty one.
pub fn diff_category(
    category: &CategoryEntry,
    live_record: Option<&Value>,
    candidate_record: &Value,
) -> ChangeRecord {
    let mut record = ChangeRecord {
        category_id: category.name().to_owned(),
        changed_field_count: 0,
        changed_fields: Vec::new(),
        has_structural_errors: false,
    };

    let Some(candidate) = candidate_record.as_object() else {
        record.has_structural_errors = true;
        return record;
    };
    let live = live_record.and_then(Value::as_object);

    for field in category.fields() {
        let Some(incoming) = candidate.get(field.name()) else {
            continue;
        };
        let current = live
            .and_then(|record| record.get(field.name()))
            .unwrap_or(&Value::Null);
        let path = FieldPath::category(category.name()).key(field.name());

        if !field.kind().accepts(incoming) {
            record.has_structural_errors = true;
            if incoming != current {
                record.changed_fields.push(path);
            }
            continue;
        }

        match (field.kind(), incoming.as_array()) {
            (ValueKind::ArrayOfRecord { key }, Some(after)) => {
                let before = current.as_array().map(Vec::as_slice).unwrap_or_default();
                let changed = match key {
                    Some(key) => keyed_changes(&path, key, before, after),
                    None => positional_changes(&path, before, after),
                };
                record.changed_fields.extend(changed);
            }
            _ => {
                if incoming != current {
                    record.changed_fields.push(path);
                }
            }
        }
    }

    record.changed_field_count = record.changed_fields.len();
    record
}

/// Change records for every declared category present in `candidate`, in
/// registration order.
pub fn analyze(registry: &Registry, live: &Document, candidate: &Document) -> Vec<ChangeRecord> {
    let records: Vec<ChangeRecord> = registry
        .categories()
        .filter_map(|category| {
            let incoming = candidate.raw_category(category.name())?;
            Some(diff_category(
                category,
                live.raw_category(category.name()),
                incoming,
            ))
        })
        .collect();

    for name in candidate.category_names() {
        if !registry.is_known(name) {
            debug!(category = name, "candidate category is not declared; passthrough");
        }
    }
    records
}

fn positional_changes(path: &FieldPath, before: &[Value], after: &[Value]) -> Vec<FieldPath> {
    (0..before.len().max(after.len()))
        .filter(|&idx| before.get(idx) != after.get(idx))
        .map(|idx| path.clone().index(idx))
        .collect()
}

/// Entries are matched by `key`; the n-th entry with a key pairs with the
/// n-th live entry carrying the same key. Entries without a usable key fall
/// back to their position.
///
/// Added and modified entries are reported at their candidate index. Removed
/// entries are reported at their live index.
fn keyed_changes(path: &FieldPath, key: &str, before: &[Value], after: &[Value]) -> Vec<FieldPath> {
    let group_by_key = |entries: &[Value]| {
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            groups.entry(entry_key(entry, key, idx)).or_default().push(idx);
        }
        groups
    };
    let live_groups = group_by_key(before);
    let candidate_groups = group_by_key(after);

    let mut changed = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (idx, entry) in after.iter().enumerate() {
        let id = entry_key(entry, key, idx);
        let ordinal = occurrence(&mut seen, &id);
        let counterpart = live_groups
            .get(&id)
            .and_then(|indices| indices.get(ordinal))
            .map(|&live_idx| &before[live_idx]);
        if counterpart != Some(entry) {
            changed.push(path.clone().index(idx));
        }
    }

    seen.clear();
    for (idx, entry) in before.iter().enumerate() {
        let id = entry_key(entry, key, idx);
        let ordinal = occurrence(&mut seen, &id);
        let remaining = candidate_groups.get(&id).map_or(0, Vec::len);
        if ordinal >= remaining {
            changed.push(path.clone().index(idx));
        }
    }
    changed
}

/// Zero-based count of earlier entries that carried `id`.
fn occurrence(seen: &mut HashMap<String, usize>, id: &str) -> usize {
    let count = seen.entry(id.to_owned()).or_insert(0);
    let ordinal = *count;
    *count += 1;
    ordinal
}

fn entry_key(entry: &Value, key: &str, idx: usize) -> String {
    match entry.get(key) {
        Some(Value::String(id)) => format!("s:{id}"),
        Some(value) if !value.is_null() => format!("v:{value}"),
        _ => format!("#{idx}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use settings_validate::FieldEntry;

    fn ai() -> CategoryEntry {
        CategoryEntry::new("ai")
            .with_field(FieldEntry::new(
                "backends",
                ValueKind::ArrayOfRecord {
                    key: Some("id".into()),
                },
            ))
            .with_field(FieldEntry::new(
                "history",
                ValueKind::ArrayOfRecord { key: None },
            ))
            .with_field(FieldEntry::new("defaultBackend", ValueKind::String))
    }

    fn paths(record: &ChangeRecord) -> Vec<String> {
        record.changed_fields.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn keyed_reorder_is_not_a_change() {
        let live = json!({ "backends": [ { "id": "a", "model": "1" }, { "id": "b", "model": "2" } ] });
        let candidate = json!({ "backends": [ { "id": "b", "model": "2" }, { "id": "a", "model": "1" } ] });
        let record = diff_category(&ai(), Some(&live), &candidate);
        assert!(record.is_noop());
        assert!(!record.has_structural_errors);
    }

    #[test]
    fn keyed_entries_count_once_each() {
        let live = json!({ "backends": [ { "id": "a", "model": "1" }, { "id": "b", "model": "2" } ] });
        let candidate = json!({
            "backends": [ { "id": "a", "model": "9" }, { "id": "c", "model": "3" } ]
        });
        let record = diff_category(&ai(), Some(&live), &candidate);
        assert_eq!(record.changed_field_count, 3);
        // modified `a` and added `c` at candidate indices, removed `b` at its live index
        assert_eq!(
            paths(&record),
            vec!["ai.backends[0]", "ai.backends[1]", "ai.backends[1]"]
        );
    }

    #[test]
    fn duplicate_keys_count_every_occurrence() {
        let single = json!({ "backends": [ { "id": "a", "model": "1" } ] });
        let doubled = json!({ "backends": [ { "id": "a", "model": "1" }, { "id": "a", "model": "2" } ] });

        let added = diff_category(&ai(), Some(&single), &doubled);
        assert!(!added.is_noop());
        assert_eq!(paths(&added), vec!["ai.backends[1]"]);

        let dropped = diff_category(&ai(), Some(&doubled), &single);
        assert!(!dropped.is_noop());
        assert_eq!(paths(&dropped), vec!["ai.backends[1]"]);

        assert!(diff_category(&ai(), Some(&doubled), &doubled).is_noop());
    }

    #[test]
    fn duplicate_keys_pair_in_order() {
        let live = json!({ "backends": [ { "id": "a", "model": "1" }, { "id": "a", "model": "2" } ] });
        let candidate = json!({
            "backends": [ { "id": "a", "model": "1" }, { "id": "b", "model": "3" }, { "id": "a", "model": "5" } ]
        });
        let record = diff_category(&ai(), Some(&live), &candidate);
        assert_eq!(paths(&record), vec!["ai.backends[1]", "ai.backends[2]"]);
    }

    #[test]
    fn unkeyed_arrays_compare_positionally() {
        let live = json!({ "history": [ { "q": 1 }, { "q": 2 } ] });
        let candidate = json!({ "history": [ { "q": 2 }, { "q": 1 }, { "q": 3 } ] });
        let record = diff_category(&ai(), Some(&live), &candidate);
        assert_eq!(record.changed_field_count, 3);
    }

    #[test]
    fn absent_and_undeclared_fields_are_ignored() {
        let live = json!({ "defaultBackend": "a", "backends": [] });
        let candidate = json!({ "unknownField": 1 });
        assert!(diff_category(&ai(), Some(&live), &candidate).is_noop());
    }

    #[test]
    fn structural_problems_are_flagged() {
        let record = diff_category(&ai(), None, &json!("not a record"));
        assert!(record.has_structural_errors);
        assert!(record.is_noop());

        let record = diff_category(&ai(), None, &json!({ "defaultBackend": 7 }));
        assert!(record.has_structural_errors);
        assert_eq!(paths(&record), vec!["ai.defaultBackend"]);
    }
}
