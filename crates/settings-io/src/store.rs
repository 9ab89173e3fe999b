use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use settings_model::Document;
use thiserror::Error;
use tracing::{debug, warn};

use crate::atomic::atomic_write;
use crate::parse::{export_document, parse_candidate, DeclaredFormat, ParseError};

/// Failures reported by a [`SettingsStore`]. The caller's live document is
/// never affected by them.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("no settings stored at {path}")]
    Missing { path: PathBuf },
    #[error("failed to read settings from {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write settings to {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("stored settings are unreadable: {0}")]
    Decode(#[source] ParseError),
    #[error("failed to encode settings: {0}")]
    Encode(#[source] ParseError),
    #[error("settings store rejected the write: {reason}")]
    Rejected { reason: String },
}

/// Persistence collaborator the engine commits through.
pub trait SettingsStore: Send + Sync {
    fn save(&self, document: &Document) -> Result<(), PersistError>;

    fn load(&self) -> Result<Document, PersistError>;
}

/// Document stored as a single JSON or YAML file, replaced atomically.
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
    format: DeclaredFormat,
}

impl FileStore {
    /// Store at `path`, format inferred from the extension (JSON otherwise).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = DeclaredFormat::from_path(&path).unwrap_or_default();
        FileStore { path, format }
    }

    pub fn with_format(mut self, format: DeclaredFormat) -> Self {
        self.format = format;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> DeclaredFormat {
        self.format
    }
}

impl SettingsStore for FileStore {
    fn save(&self, document: &Document) -> Result<(), PersistError> {
        let contents = export_document(document, self.format).map_err(PersistError::Encode)?;
        atomic_write(&self.path, &contents).map_err(|source| PersistError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), categories = document.len(), "saved settings");
        Ok(())
    }

    fn load(&self) -> Result<Document, PersistError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(PersistError::Missing {
                    path: self.path.clone(),
                })
            }
            Err(source) => {
                return Err(PersistError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        parse_candidate(&bytes, self.format)
            .and_then(|raw| raw.into_document())
            .map_err(PersistError::Decode)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    document: Option<Document>,
    failure: Option<String>,
    saves: usize,
}

/// In-memory store. Can be told to reject writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn with_document(document: Document) -> Self {
        let store = MemoryStore::new();
        store.state().document = Some(document);
        store
    }

    /// Reject every save with `reason` until [`MemoryStore::clear_failure`].
    pub fn fail_with(&self, reason: impl Into<String>) {
        self.state().failure = Some(reason.into());
    }

    pub fn clear_failure(&self) {
        self.state().failure = None;
    }

    /// Last successfully saved document.
    pub fn snapshot(&self) -> Option<Document> {
        self.state().document.clone()
    }

    pub fn save_count(&self) -> usize {
        self.state().saves
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SettingsStore for MemoryStore {
    fn save(&self, document: &Document) -> Result<(), PersistError> {
        let mut state = self.state();
        if let Some(reason) = &state.failure {
            warn!(%reason, "memory store rejecting save");
            return Err(PersistError::Rejected {
                reason: reason.clone(),
            });
        }
        state.document = Some(document.clone());
        state.saves += 1;
        Ok(())
    }

    fn load(&self) -> Result<Document, PersistError> {
        self.state()
            .document
            .clone()
            .ok_or_else(|| PersistError::Missing {
                path: PathBuf::from("<memory>"),
            })
    }
}
