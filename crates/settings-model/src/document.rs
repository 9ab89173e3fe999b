use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::kind::value_type_name;
use crate::path::{FieldPath, PathSegment};

/// Mapping from field name to value for one category.
pub type CategoryRecord = Map<String, Value>;

/// Ordered configuration document keyed by category name.
///
/// Category order is insertion order and survives serialisation. Categories
/// whose value is not an object are kept verbatim as passthrough entries.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    categories: Map<String, Value>,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document root must be an object (found {found})")]
    NotAnObject { found: &'static str },
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        match value {
            Value::Object(categories) => Ok(Document { categories }),
            other => Err(DocumentError::NotAnObject {
                found: value_type_name(&other),
            }),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.categories.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.categories)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn contains_category(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.categories
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Category record, when the category exists and holds an object.
    pub fn category(&self, name: &str) -> Option<&CategoryRecord> {
        self.categories.get(name).and_then(Value::as_object)
    }

    /// Raw category value regardless of its shape.
    pub fn raw_category(&self, name: &str) -> Option<&Value> {
        self.categories.get(name)
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        let mut segments = path.segments().iter();
        let mut current = match segments.next()? {
            PathSegment::Key(key) => self.categories.get(key)?,
            PathSegment::Index(_) => return None,
        };
        for segment in segments {
            current = match segment {
                PathSegment::Key(key) => current.as_object()?.get(key)?,
                PathSegment::Index(index) => current.as_array()?.get(*index)?,
            };
        }
        Some(current)
    }

    /// Resolve a dotted path such as `git.signCommits`. Unparseable paths
    /// resolve to `None`.
    pub fn lookup(&self, dotted: &str) -> Option<&Value> {
        FieldPath::parse(dotted)
            .ok()
            .and_then(|path| self.get(&path))
    }

    /// Copy of this document with `name` set to `record`. Existing categories
    /// keep their position; new ones are appended.
    pub fn with_category(&self, name: &str, record: CategoryRecord) -> Document {
        let mut next = self.clone();
        next.set_category(name, record);
        next
    }

    pub fn set_category(&mut self, name: &str, record: CategoryRecord) {
        self.categories.insert(name.to_owned(), Value::Object(record));
    }

    pub fn set_raw_category(&mut self, name: &str, value: Value) {
        self.categories.insert(name.to_owned(), value);
    }
}

impl TryFrom<Value> for Document {
    type Error = DocumentError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Document::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Document {
        Document::from_value(json!({
            "editor": { "tabSize": 4, "wordWrap": true },
            "ai": { "backends": [ { "id": "local", "model": "m1" } ] },
            "legacy": "opaque"
        }))
        .unwrap()
    }

    #[test]
    fn rejects_non_object_roots() {
        let err = Document::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, DocumentError::NotAnObject { found: "array" }));
    }

    #[test]
    fn resolves_nested_paths() {
        let doc = sample();
        assert_eq!(doc.lookup("editor.tabSize"), Some(&json!(4)));
        assert_eq!(doc.lookup("ai.backends[0].model"), Some(&json!("m1")));
        assert_eq!(doc.lookup("ai.backends[3].model"), None);
        assert_eq!(doc.lookup("legacy.anything"), None);
        assert!(doc.category("legacy").is_none());
        assert_eq!(doc.raw_category("legacy"), Some(&json!("opaque")));
    }

    #[test]
    fn with_category_keeps_position_and_input() {
        let doc = sample();
        let mut record = CategoryRecord::new();
        record.insert("tabSize".into(), json!(2));

        let next = doc.with_category("editor", record);
        assert_eq!(doc.lookup("editor.tabSize"), Some(&json!(4)));
        assert_eq!(next.lookup("editor.tabSize"), Some(&json!(2)));
        assert_eq!(
            next.category_names().collect::<Vec<_>>(),
            vec!["editor", "ai", "legacy"]
        );
    }
}
