use serde_json::Value;
use settings_model::{CategoryRecord, Document, FieldPath};

/// Read-only view handed to validators: the whole document plus the path
/// currently being validated.
#[derive(Clone, Copy, Debug)]
pub struct ValidationContext<'a> {
    document: &'a Document,
    path: &'a FieldPath,
}

impl<'a> ValidationContext<'a> {
    pub fn new(document: &'a Document, path: &'a FieldPath) -> Self {
        ValidationContext { document, path }
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn path(&self) -> &'a FieldPath {
        self.path
    }

    /// Value at the validated path, if present.
    pub fn value(&self) -> Option<&'a Value> {
        self.document.get(self.path)
    }

    pub fn get(&self, path: &FieldPath) -> Option<&'a Value> {
        self.document.get(path)
    }

    /// Resolve a dotted path such as `git.signCommits` anywhere in the document.
    pub fn lookup(&self, dotted: &str) -> Option<&'a Value> {
        self.document.lookup(dotted)
    }

    /// Field that lives in the same record as the validated path.
    pub fn sibling(&self, name: &str) -> Option<&'a Value> {
        let parent = self.path.parent()?;
        self.document.get(&parent)?.as_object()?.get(name)
    }

    /// Record of the category the validated path belongs to.
    pub fn category_record(&self) -> Option<&'a CategoryRecord> {
        self.path
            .category_name()
            .and_then(|name| self.document.category(name))
    }
}
