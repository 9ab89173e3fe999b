//! Import flow state machine.
//!
//! ```text
//! Idle ─▶ CandidateLoaded ─▶ Analyzed ─▶ SelectionMade ─▶ PlanBuilt ─▶ Applying ─▶ Applied
//!                                          ▲       │                     │
//!                                          │       ▼                     ▼
//!                                          └── PlanRejected        PersistFailed ─▶ (retry) PlanBuilt
//! ```
//!
//! Every transition consumes the flow. A transition attempted from the wrong
//! state returns [`FlowError::InvalidTransition`] carrying the untouched flow
//! so callers can recover it.

use std::fmt;

use settings_import::{ChangeRecord, MergePlan, MergePlanResult, PlanError};
use settings_io::{PersistError, SettingsStore};
use settings_model::{Document, MergeMode, ValidationIssue};
use thiserror::Error;
use tracing::{debug, warn};

use crate::SettingsEngine;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FlowState {
    Idle,
    CandidateLoaded,
    Analyzed,
    SelectionMade,
    PlanBuilt,
    PlanRejected,
    Applying,
    Applied,
    PersistFailed,
}

impl FlowState {
    pub fn as_str(self) -> &'static str {
        match self {
            FlowState::Idle => "idle",
            FlowState::CandidateLoaded => "candidate-loaded",
            FlowState::Analyzed => "analyzed",
            FlowState::SelectionMade => "selection-made",
            FlowState::PlanBuilt => "plan-built",
            FlowState::PlanRejected => "plan-rejected",
            FlowState::Applying => "applying",
            FlowState::Applied => "applied",
            FlowState::PersistFailed => "persist-failed",
        }
    }

    pub fn can_transition_to(self, next: FlowState) -> bool {
        matches!(
            (self, next),
            (FlowState::Idle, FlowState::CandidateLoaded)
                | (FlowState::CandidateLoaded, FlowState::Analyzed)
                | (
                    FlowState::Analyzed | FlowState::SelectionMade | FlowState::PlanRejected,
                    FlowState::SelectionMade
                )
                | (
                    FlowState::SelectionMade | FlowState::PersistFailed,
                    FlowState::PlanBuilt | FlowState::PlanRejected
                )
                | (FlowState::PlanBuilt, FlowState::Applying)
                | (FlowState::Applying, FlowState::Applied | FlowState::PersistFailed)
        )
    }

    /// Whether the flow has nothing left to do.
    pub fn is_terminal(self) -> bool {
        self == FlowState::Applied
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("cannot {action} while the import is {from}")]
    InvalidTransition {
        from: FlowState,
        action: &'static str,
        flow: Box<ImportFlow>,
    },
    #[error("cannot plan import: {source}")]
    Plan {
        source: PlanError,
        flow: Box<ImportFlow>,
    },
}

impl FlowError {
    /// Recover the flow, unchanged by the failed transition.
    pub fn into_flow(self) -> ImportFlow {
        match self {
            FlowError::InvalidTransition { flow, .. } | FlowError::Plan { flow, .. } => *flow,
        }
    }
}

/// One import session over a live document.
#[derive(Debug)]
pub struct ImportFlow {
    state: FlowState,
    live: Document,
    candidate: Option<Document>,
    changes: Vec<ChangeRecord>,
    selection: Vec<String>,
    mode: MergeMode,
    plan: Option<MergePlan>,
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
    pending: Option<Document>,
    persist_error: Option<PersistError>,
}

impl ImportFlow {
    pub fn new(live: Document) -> Self {
        ImportFlow {
            state: FlowState::Idle,
            live,
            candidate: None,
            changes: Vec::new(),
            selection: Vec::new(),
            mode: MergeMode::default(),
            plan: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            pending: None,
            persist_error: None,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Current live document. Replaced only once a commit succeeds.
    pub fn live(&self) -> &Document {
        &self.live
    }

    pub fn into_live(self) -> Document {
        self.live
    }

    pub fn candidate(&self) -> Option<&Document> {
        self.candidate.as_ref()
    }

    pub fn changes(&self) -> &[ChangeRecord] {
        &self.changes
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn mode(&self) -> MergeMode {
        self.mode
    }

    pub fn plan(&self) -> Option<&MergePlan> {
        self.plan.as_ref()
    }

    /// Blocking issues from the last rejected plan.
    pub fn errors(&self) -> &[ValidationIssue] {
        &self.errors
    }

    pub fn warnings(&self) -> &[ValidationIssue] {
        &self.warnings
    }

    pub fn persist_error(&self) -> Option<&PersistError> {
        self.persist_error.as_ref()
    }

    /// Idle → CandidateLoaded.
    pub fn load_candidate(self, candidate: Document) -> Result<Self, FlowError> {
        let mut flow = self.guard(FlowState::CandidateLoaded, "load a candidate")?;
        flow.candidate = Some(candidate);
        Ok(flow.enter(FlowState::CandidateLoaded))
    }

    /// CandidateLoaded → Analyzed.
    pub fn analyze(self, engine: &SettingsEngine) -> Result<Self, FlowError> {
        let mut flow = self.guard(FlowState::Analyzed, "analyze changes")?;
        flow.changes = match &flow.candidate {
            Some(candidate) => engine.analyze(&flow.live, candidate),
            None => Vec::new(),
        };
        Ok(flow.enter(FlowState::Analyzed))
    }

    /// Analyzed | SelectionMade | PlanRejected → SelectionMade.
    pub fn select<S: AsRef<str>>(self, categories: &[S], mode: MergeMode) -> Result<Self, FlowError> {
        let mut flow = self.guard(FlowState::SelectionMade, "select categories")?;
        flow.selection = categories
            .iter()
            .map(|name| name.as_ref().to_owned())
            .collect();
        flow.mode = mode;
        flow.errors.clear();
        flow.warnings.clear();
        Ok(flow.enter(FlowState::SelectionMade))
    }

    /// SelectionMade | PersistFailed → PlanBuilt | PlanRejected.
    ///
    /// A [`PlanError`] leaves the flow where it was.
    pub fn build_plan(self, engine: &SettingsEngine) -> Result<Self, FlowError> {
        let mut flow = self.guard(FlowState::PlanBuilt, "build a plan")?;
        let empty = Document::new();
        let candidate = flow.candidate.as_ref().unwrap_or(&empty);
        let result = match engine.build_plan(&flow.live, candidate, flow.selection.as_slice(), flow.mode) {
            Ok(result) => result,
            Err(source) => {
                return Err(FlowError::Plan {
                    source,
                    flow: Box::new(flow),
                })
            }
        };

        flow.persist_error = None;
        flow.pending = None;
        match result {
            MergePlanResult::Ready { plan, warnings } => {
                flow.plan = Some(plan);
                flow.errors.clear();
                flow.warnings = warnings;
                Ok(flow.enter(FlowState::PlanBuilt))
            }
            MergePlanResult::Rejected { errors, warnings } => {
                flow.plan = None;
                flow.errors = errors;
                flow.warnings = warnings;
                Ok(flow.enter(FlowState::PlanRejected))
            }
        }
    }

    /// PersistFailed → PlanBuilt. Re-plans from the unchanged live document.
    pub fn retry(self, engine: &SettingsEngine) -> Result<Self, FlowError> {
        if self.state != FlowState::PersistFailed {
            return Err(self.invalid("retry"));
        }
        self.build_plan(engine)
    }

    /// PlanBuilt → Applying. Consumes the plan.
    pub fn apply(self, engine: &SettingsEngine) -> Result<Self, FlowError> {
        let mut flow = self.guard(FlowState::Applying, "apply the plan")?;
        let Some(plan) = flow.plan.take() else {
            return Err(flow.invalid("apply the plan"));
        };
        flow.pending = Some(engine.apply(&flow.live, plan));
        Ok(flow.enter(FlowState::Applying))
    }

    /// Applying → Applied | PersistFailed.
    pub fn persist(self, store: &dyn SettingsStore) -> Result<Self, FlowError> {
        let mut flow = self.guard(FlowState::Applied, "persist settings")?;
        let Some(next) = flow.pending.take() else {
            return Err(flow.invalid("persist settings"));
        };
        match store.save(&next) {
            Ok(()) => {
                flow.live = next;
                Ok(flow.enter(FlowState::Applied))
            }
            Err(err) => {
                warn!(error = %err, "import could not be persisted");
                flow.persist_error = Some(err);
                Ok(flow.enter(FlowState::PersistFailed))
            }
        }
    }

    /// Drop any in-progress import and start over from the current live document.
    pub fn reset(self) -> Self {
        ImportFlow::new(self.live)
    }

    fn guard(self, next: FlowState, action: &'static str) -> Result<Self, FlowError> {
        if self.state.can_transition_to(next) {
            Ok(self)
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(self, action: &'static str) -> FlowError {
        FlowError::InvalidTransition {
            from: self.state,
            action,
            flow: Box::new(self),
        }
    }

    fn enter(mut self, next: FlowState) -> Self {
        debug!(from = %self.state, to = %next, "import flow transition");
        self.state = next;
        self
    }
}
