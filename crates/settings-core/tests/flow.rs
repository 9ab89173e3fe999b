use pretty_assertions::assert_eq;
use serde_json::json;
use settings_core::{FlowError, FlowState, ImportFlow, SettingsEngine};
use settings_io::MemoryStore;
use settings_model::{IssueCode, MergeMode};
use settings_test_support::{document, sample_config, sample_document};

fn engine() -> SettingsEngine {
    SettingsEngine::bootstrap(sample_config()).expect("bootstrap")
}

#[test]
fn happy_path_reaches_applied() {
    let engine = engine();
    let store = MemoryStore::new();
    let candidate = document(json!({
        "editor": { "tabSize": 2 },
        "appearance": { "density": "compact" }
    }));

    let flow = ImportFlow::new(sample_document())
        .load_candidate(candidate)
        .and_then(|flow| flow.analyze(&engine))
        .expect("analyzed");
    assert_eq!(flow.state(), FlowState::Analyzed);
    assert_eq!(flow.changes().len(), 2);

    let flow = flow
        .select(&["editor"], MergeMode::Merge)
        .and_then(|flow| flow.build_plan(&engine))
        .expect("planned");
    assert_eq!(flow.state(), FlowState::PlanBuilt);
    assert!(flow.plan().is_some());

    let flow = flow
        .apply(&engine)
        .and_then(|flow| flow.persist(&store))
        .expect("persisted");
    assert_eq!(flow.state(), FlowState::Applied);
    assert!(flow.state().is_terminal());
    assert_eq!(flow.live().lookup("editor.tabSize"), Some(&json!(2)));
    assert_eq!(flow.live().lookup("appearance.density"), Some(&json!("comfortable")));
    assert_eq!(store.snapshot().as_ref(), Some(flow.live()));
}

#[test]
fn rejected_plan_can_be_reselected() {
    let engine = engine();
    let candidate = document(json!({
        "editor": { "tabSize": 20 },
        "appearance": { "density": "compact" }
    }));

    let flow = ImportFlow::new(sample_document())
        .load_candidate(candidate)
        .and_then(|flow| flow.analyze(&engine))
        .and_then(|flow| flow.select(&["editor", "appearance"], MergeMode::Merge))
        .and_then(|flow| flow.build_plan(&engine))
        .expect("flow");
    assert_eq!(flow.state(), FlowState::PlanRejected);
    assert!(flow.plan().is_none());
    assert_eq!(flow.errors().len(), 1);
    assert_eq!(flow.errors()[0].code, IssueCode::Range);

    let err = flow.apply(&engine).expect_err("no plan to apply");
    assert!(matches!(
        err,
        FlowError::InvalidTransition {
            from: FlowState::PlanRejected,
            ..
        }
    ));

    let flow = err
        .into_flow()
        .select(&["appearance"], MergeMode::Merge)
        .and_then(|flow| flow.build_plan(&engine))
        .expect("replanned");
    assert_eq!(flow.state(), FlowState::PlanBuilt);
    assert!(flow.errors().is_empty());
}

#[test]
fn persist_failure_keeps_live_and_allows_retry() {
    let engine = engine();
    let store = MemoryStore::new();
    store.fail_with("disk full");
    let live = sample_document();

    let flow = ImportFlow::new(live.clone())
        .load_candidate(document(json!({ "editor": { "theme": "light" } })))
        .and_then(|flow| flow.analyze(&engine))
        .and_then(|flow| flow.select(&["editor"], MergeMode::Merge))
        .and_then(|flow| flow.build_plan(&engine))
        .and_then(|flow| flow.apply(&engine))
        .and_then(|flow| flow.persist(&store))
        .expect("flow");
    assert_eq!(flow.state(), FlowState::PersistFailed);
    assert!(flow.persist_error().is_some());
    assert_eq!(flow.live(), &live);

    store.clear_failure();
    let flow = flow
        .retry(&engine)
        .and_then(|flow| flow.apply(&engine))
        .and_then(|flow| flow.persist(&store))
        .expect("retried");
    assert_eq!(flow.state(), FlowState::Applied);
    assert_eq!(flow.live().lookup("editor.theme"), Some(&json!("light")));
    assert_eq!(store.save_count(), 1);
}

#[test]
fn out_of_order_transitions_return_the_flow() {
    let engine = engine();
    let err = ImportFlow::new(sample_document())
        .analyze(&engine)
        .expect_err("nothing loaded");
    assert_eq!(
        err.to_string(),
        "cannot analyze changes while the import is idle"
    );
    let flow = err.into_flow();
    assert_eq!(flow.state(), FlowState::Idle);
    assert_eq!(flow.live(), &sample_document());

    let err = flow.retry(&engine).expect_err("nothing to retry");
    assert!(matches!(err, FlowError::InvalidTransition { action: "retry", .. }));
}

#[test]
fn plan_errors_leave_the_selection_in_place() {
    let engine = engine();
    let err = ImportFlow::new(sample_document())
        .load_candidate(document(json!({ "editor": { "tabSize": 2 } })))
        .and_then(|flow| flow.analyze(&engine))
        .and_then(|flow| flow.select(&["git"], MergeMode::Replace))
        .and_then(|flow| flow.build_plan(&engine))
        .expect_err("git missing from candidate");
    assert!(matches!(err, FlowError::Plan { .. }));

    let flow = err.into_flow();
    assert_eq!(flow.state(), FlowState::SelectionMade);
    assert_eq!(flow.selection(), ["git".to_owned()]);
    assert_eq!(flow.mode(), MergeMode::Replace);
    assert_eq!(flow.reset().state(), FlowState::Idle);
}
