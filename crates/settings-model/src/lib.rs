//! Shared data model for the settings validation and merge engine.
//!
//! A configuration [`Document`] is an ordered mapping from category name to a
//! category record. Validation results are expressed as path-addressed
//! [`ValidationIssue`]s grouped into a [`ValidationOutcome`]. Every other crate
//! in the workspace speaks in these types.

pub mod document;
pub mod issue;
pub mod kind;
pub mod mode;
pub mod path;

pub use document::{CategoryRecord, Document, DocumentError};
pub use issue::{has_blocking, IssueCode, Severity, ValidationIssue, ValidationOutcome};
pub use kind::{is_empty_value, value_type_name, ValueKind};
pub use mode::MergeMode;
pub use path::{FieldPath, PathParseError, PathSegment};

pub use serde_json::{Map, Value};
