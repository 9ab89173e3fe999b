//! Core orchestration layer for the settings engine.

mod flow;

use settings_config::{Config, ImportSettings};
use settings_import::{ChangeRecord, MergePlan, MergePlanResult, PlanError};
use settings_io::{PersistError, SettingsStore};
use settings_model::{Document, MergeMode, ValidationIssue};
use settings_validate::{CatalogError, Orchestrator};
use tracing::{debug, warn};

pub use flow::{FlowError, FlowState, ImportFlow};

/// Entry point for higher-level consumers (CLI, settings panels, etc.).
pub struct SettingsEngine {
    orchestrator: Orchestrator,
    import: ImportSettings,
}

impl SettingsEngine {
    /// Bootstrap the engine from configuration, compiling its catalog.
    pub fn bootstrap(config: Config) -> Result<Self, CatalogError> {
        let orchestrator = Orchestrator::from_config(&config)?;
        debug!(
            categories = orchestrator.registry().len(),
            "bootstrapped settings engine"
        );
        Ok(Self {
            orchestrator,
            import: config.import,
        })
    }

    /// Wrap an already-built orchestrator with default import settings.
    pub fn from_orchestrator(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            import: ImportSettings::default(),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn import_settings(&self) -> &ImportSettings {
        &self.import
    }

    pub fn default_mode(&self) -> MergeMode {
        self.import.default_mode
    }

    pub fn validate_document(&self, document: &Document) -> Vec<ValidationIssue> {
        self.orchestrator.validate_document(document)
    }

    pub fn validate_field(
        &self,
        document: &Document,
        category: &str,
        field: &str,
    ) -> Vec<ValidationIssue> {
        self.orchestrator.validate_field(document, category, field)
    }

    pub fn analyze(&self, live: &Document, candidate: &Document) -> Vec<ChangeRecord> {
        settings_import::analyze(self.orchestrator.registry(), live, candidate)
    }

    pub fn build_plan<S: AsRef<str>>(
        &self,
        live: &Document,
        candidate: &Document,
        selections: &[S],
        mode: MergeMode,
    ) -> Result<MergePlanResult, PlanError> {
        settings_import::build_plan(&self.orchestrator, live, candidate, selections, mode)
    }

    /// Unified diffs for every planned category, using the configured context.
    pub fn previews(&self, live: &Document, plan: &MergePlan) -> Vec<(String, String)> {
        plan.previews(live, self.import.preview_context)
    }

    pub fn apply(&self, live: &Document, plan: MergePlan) -> Document {
        settings_import::apply(live, plan)
    }

    /// Apply `plan` and hand the result to `store`.
    ///
    /// On failure nothing is returned; `live` was only borrowed and remains
    /// the current document.
    pub fn commit(
        &self,
        store: &dyn SettingsStore,
        live: &Document,
        plan: MergePlan,
    ) -> Result<Document, PersistError> {
        let next = self.apply(live, plan);
        match store.save(&next) {
            Ok(()) => Ok(next),
            Err(err) => {
                warn!(error = %err, "failed to persist imported settings");
                Err(err)
            }
        }
    }
}
