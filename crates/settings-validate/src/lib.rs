//! Field validators, their combinators, and the document-level orchestrator.
//!
//! Categories are either registered programmatically through [`Registry`] or
//! compiled from the `[[categories]]` declarations of the engine config with
//! [`Registry::from_catalog`]. The [`Orchestrator`] turns a document into a
//! flat, deterministic, path-addressed issue list.

mod catalog;
pub mod collection;
pub mod combinators;
pub mod context;
pub mod orchestrator;
pub mod registry;
pub mod validator;

pub use collection::DocumentRule;
pub use combinators::{
    compose, conditional, custom, depends_on, email_format, fallible, hex_color_format,
    max_value, min_value, one_of, pattern, range, required, try_pattern, url_format,
    with_severity,
};
pub use context::ValidationContext;
pub use orchestrator::Orchestrator;
pub use registry::{CatalogError, CategoryEntry, FieldEntry, Registry};
pub use validator::{Predicate, Validator};
