//! Persistence and interchange for settings documents.
//!
//! [`SettingsStore`] is the seam the engine commits through; [`FileStore`]
//! writes atomically and [`MemoryStore`] backs tests. Imported files are
//! parsed into an untrusted [`RawDocument`] before they become a
//! [`settings_model::Document`].

mod atomic;
mod parse;
mod store;

pub use atomic::atomic_write;
pub use parse::{export_document, parse_candidate, DeclaredFormat, ParseError, RawDocument};
pub use store::{FileStore, MemoryStore, PersistError, SettingsStore};
