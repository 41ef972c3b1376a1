//! End-to-end workflow tests against the in-memory backend.
//!
//! Requests go through the dispatcher as JSON, and every callback context is
//! round-tripped through its wire form before the next invocation.

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use rstest::rstest;
use serde_json::{json, Value};
use ssoa_api::ApiError;
use ssoa_events::{Action, HandlerErrorCode, HandlerRequest, OperationStatus, ProgressEvent};
use ssoa_handlers::{Dispatcher, HandlerConfig};
use ssoa_reconcile::{StageId, WorkflowContext};
use ssoa_testing::{fixtures, MemoryBackend, Operation, SandboxSettings};

type WireEvent = ProgressEvent<Value, WorkflowContext>;

const ASSIGNMENT: &str = "AWS::SSO::Assignment";
const PERMISSION_SET: &str = "AWS::SSO::PermissionSet";

fn sandbox(pending_polls: u32) -> Arc<MemoryBackend> {
    let backend = MemoryBackend::with_settings(SandboxSettings {
        page_size: 2,
        pending_polls,
    });
    backend.insert_permission_set(fixtures::permission_set_arn(), fixtures::permission_set_name());
    Arc::new(backend)
}

fn dispatcher(backend: &Arc<MemoryBackend>) -> Dispatcher {
    let config = HandlerConfig {
        jitter_seed: Some(7),
        ..HandlerConfig::default()
    };
    Dispatcher::new(backend.clone(), config)
}

fn assignment() -> Value {
    json!({
        "InstanceArn": fixtures::INSTANCE_ARN,
        "TargetId": fixtures::ACCOUNT_ID,
        "TargetType": "AWS_ACCOUNT",
        "PermissionSetArn": fixtures::PERMISSION_SET_ARN,
        "PrincipalType": "GROUP",
        "PrincipalId": fixtures::PRINCIPAL_ID,
    })
}

fn permission_set(tags: &BTreeMap<String, String>) -> Value {
    let tags: Vec<Value> = tags
        .iter()
        .map(|(k, v)| json!({ "Key": k, "Value": v }))
        .collect();
    json!({
        "InstanceArn": fixtures::INSTANCE_ARN,
        "Name": "Developers",
        "SessionDuration": "PT4H",
        "Tags": tags,
    })
}

/// Simulates the driver's persistence of an event between invocations.
fn over_the_wire(event: WireEvent) -> WireEvent {
    let text = serde_json::to_string(&event).unwrap();
    serde_json::from_str(&text).unwrap()
}

/// Invokes once per step, feeding each returned context into the next call,
/// until the workflow ends. Returns every event.
async fn drive(dispatcher: &Dispatcher, request: HandlerRequest<Value, WorkflowContext>) -> Vec<WireEvent> {
    let mut events = Vec::new();
    let mut context = None;
    for _ in 0..20 {
        let event = over_the_wire(dispatcher.handle(request.clone().with_context(context)).await);
        let done = event.is_terminal();
        context = event.callback_context.clone();
        events.push(event);
        if done {
            return events;
        }
    }
    panic!("workflow did not terminate: {events:?}");
}

fn statuses(events: &[WireEvent]) -> Vec<OperationStatus> {
    events.iter().map(|e| e.status).collect()
}

#[tokio::test]
async fn test_create_with_probe_miss_waits_for_stabilization() {
    let backend = sandbox(1);
    let dispatcher = dispatcher(&backend);

    let events = drive(
        &dispatcher,
        HandlerRequest::new(Action::Create, ASSIGNMENT, assignment()),
    )
    .await;

    assert_eq!(
        statuses(&events),
        vec![OperationStatus::InProgress, OperationStatus::Success]
    );
    assert_eq!(events[0].callback_delay_seconds, 5);
    assert_eq!(events[1].resource_model, Some(assignment()));
    assert_eq!(backend.calls_to(Operation::CreateAccountAssignment), 1);
    assert_eq!(
        backend.calls_to(Operation::DescribeAccountAssignmentCreationStatus),
        2
    );
    assert_eq!(backend.snapshot().assignment_count(), 1);
}

#[tokio::test]
async fn test_create_with_probe_hit_fails_without_mutation() {
    let backend = sandbox(0);
    let dispatcher = dispatcher(&backend);
    let request = HandlerRequest::new(Action::Create, ASSIGNMENT, assignment());
    drive(&dispatcher, request.clone()).await;
    backend.clear_calls();

    let events = drive(&dispatcher, request).await;
    assert_eq!(statuses(&events), vec![OperationStatus::Failed]);
    assert_eq!(events[0].error_code, Some(HandlerErrorCode::AlreadyExists));
    assert!(backend.mutating_calls().is_empty());
}

#[tokio::test]
async fn test_replayed_context_does_not_repeat_completed_stages() {
    let backend = sandbox(3);
    let dispatcher = dispatcher(&backend);
    let request = HandlerRequest::new(Action::Create, ASSIGNMENT, assignment());

    let first = over_the_wire(dispatcher.handle(request.clone()).await);
    let ctx = first.callback_context.clone().unwrap();
    assert!(ctx.is_completed(StageId::Precondition));

    // The driver retries the same invocation twice.
    for _ in 0..2 {
        let event = dispatcher
            .handle(request.clone().with_context(Some(ctx.clone())))
            .await;
        assert_eq!(event.status, OperationStatus::InProgress);
    }
    assert_eq!(backend.calls_to(Operation::CreateAccountAssignment), 1);
    assert_eq!(backend.calls_to(Operation::ListAccountAssignments), 1);
}

/// Invokes every returned context twice, continuing from the second result.
async fn drive_with_replays(
    dispatcher: &Dispatcher,
    request: HandlerRequest<Value, WorkflowContext>,
) -> WireEvent {
    let mut event = over_the_wire(dispatcher.handle(request.clone()).await);
    for _ in 0..20 {
        if event.is_terminal() {
            return event;
        }
        let context = event.callback_context.clone();
        for _ in 0..2 {
            event = over_the_wire(
                dispatcher
                    .handle(request.clone().with_context(context.clone()))
                    .await,
            );
        }
    }
    panic!("workflow did not terminate: {event:?}");
}

#[rstest]
#[case::assignment(ASSIGNMENT, assignment())]
#[case::permission_set(PERMISSION_SET, permission_set(&BTreeMap::from([("a".to_string(), "1".to_string())])))]
#[tokio::test]
async fn test_replayed_run_ends_like_uninterrupted_run(#[case] type_name: &str, #[case] model: Value) {
    let straight_backend = sandbox(2);
    let straight = drive(
        &dispatcher(&straight_backend),
        HandlerRequest::new(Action::Create, type_name, model.clone()),
    )
    .await;
    let straight = straight.last().unwrap();

    let replayed_backend = sandbox(2);
    let replayed = drive_with_replays(
        &dispatcher(&replayed_backend),
        HandlerRequest::new(Action::Create, type_name, model),
    )
    .await;

    assert_eq!(straight.status, OperationStatus::Success);
    assert_eq!(replayed.status, straight.status);
    assert_eq!(replayed.error_code, straight.error_code);
    assert_eq!(
        replayed.resource_model.is_some(),
        straight.resource_model.is_some()
    );
    assert_eq!(
        replayed_backend.mutating_calls().len(),
        straight_backend.mutating_calls().len()
    );
    assert_eq!(
        replayed_backend.snapshot().assignment_count(),
        straight_backend.snapshot().assignment_count()
    );
    assert_eq!(
        replayed_backend.snapshot().permission_set_count(),
        straight_backend.snapshot().permission_set_count()
    );
}

#[tokio::test]
async fn test_replayed_assignment_reports_same_model() {
    let straight_backend = sandbox(2);
    let straight = drive(
        &dispatcher(&straight_backend),
        HandlerRequest::new(Action::Create, ASSIGNMENT, assignment()),
    )
    .await;

    let replayed_backend = sandbox(2);
    let replayed = drive_with_replays(
        &dispatcher(&replayed_backend),
        HandlerRequest::new(Action::Create, ASSIGNMENT, assignment()),
    )
    .await;

    assert_eq!(replayed.resource_model, straight.last().unwrap().resource_model);
    assert_eq!(
        replayed_backend.mutating_calls(),
        straight_backend.mutating_calls()
    );
}

#[tokio::test]
async fn test_throttled_status_check_uses_light_backoff() {
    let backend = sandbox(1);
    let dispatcher = dispatcher(&backend);
    let request = HandlerRequest::new(Action::Create, ASSIGNMENT, assignment());

    let first = over_the_wire(dispatcher.handle(request.clone()).await);
    assert_eq!(first.status, OperationStatus::InProgress);

    backend.fail_next(
        Operation::DescribeAccountAssignmentCreationStatus,
        ApiError::throttling("Rate exceeded"),
    );
    let second = over_the_wire(
        dispatcher
            .handle(request.clone().with_context(first.callback_context.clone()))
            .await,
    );
    assert_eq!(second.status, OperationStatus::InProgress);
    assert!(
        (40..=70).contains(&second.callback_delay_seconds),
        "delay {} outside light throttling bounds",
        second.callback_delay_seconds
    );
    assert_eq!(second.callback_context.as_ref().map(|c| c.retry_budget()), Some(4));

    let rest = drive(&dispatcher, request.with_context(second.callback_context)).await;
    assert_eq!(rest.last().map(|e| e.status), Some(OperationStatus::Success));
    assert_eq!(backend.calls_to(Operation::CreateAccountAssignment), 1);
}

#[tokio::test]
async fn test_throttled_thrice_then_success_resets_budget() {
    let backend = sandbox(1);
    backend.fail_times(
        Operation::ListAccountAssignments,
        3,
        ApiError::throttling("Rate exceeded"),
    );
    let dispatcher = dispatcher(&backend);

    let events = drive(
        &dispatcher,
        HandlerRequest::new(Action::Create, ASSIGNMENT, assignment()),
    )
    .await;

    let budgets: Vec<u32> = events
        .iter()
        .filter_map(|e| e.callback_context.as_ref())
        .map(|c| c.retry_budget())
        .collect();
    assert_eq!(budgets, vec![4, 3, 2, 5]);
    assert_eq!(events.last().map(|e| e.status), Some(OperationStatus::Success));
    // The throttled call is the light existence listing.
    for event in &events[..3] {
        assert_eq!(event.status, OperationStatus::InProgress);
        assert!(
            (40..=70).contains(&event.callback_delay_seconds),
            "delay {} outside light throttling bounds",
            event.callback_delay_seconds
        );
    }
}

#[tokio::test]
async fn test_budget_exhaustion_after_budget_plus_one_attempts() {
    let backend = sandbox(0);
    backend.fail_times(
        Operation::ListAccountAssignments,
        10,
        ApiError::throttling("Rate exceeded"),
    );
    let dispatcher = dispatcher(&backend);

    let events = drive(
        &dispatcher,
        HandlerRequest::new(Action::Create, ASSIGNMENT, assignment()),
    )
    .await;

    assert_eq!(events.len(), 6);
    let last = events.last().unwrap();
    assert_eq!(last.error_code, Some(HandlerErrorCode::GeneralServiceException));
    assert_eq!(last.message.as_deref(), Some("Rate exceeded"));
    assert_eq!(backend.calls_to(Operation::ListAccountAssignments), 6);
}

#[tokio::test]
async fn test_failed_request_is_not_stabilized() {
    let backend = sandbox(1);
    backend.fail_next_request("Principal does not exist");
    let dispatcher = dispatcher(&backend);

    let events = drive(
        &dispatcher,
        HandlerRequest::new(Action::Create, ASSIGNMENT, assignment()),
    )
    .await;

    let last = events.last().unwrap();
    assert_eq!(last.error_code, Some(HandlerErrorCode::NotStabilized));
    assert_eq!(last.message.as_deref(), Some("Principal does not exist"));
    assert_eq!(backend.snapshot().assignment_count(), 0);
}

#[tokio::test]
async fn test_invalid_model_is_invalid_request() {
    let backend = sandbox(0);
    let dispatcher = dispatcher(&backend);
    let mut model = assignment();
    model["TargetId"] = json!("12345");

    let events = drive(
        &dispatcher,
        HandlerRequest::new(Action::Create, ASSIGNMENT, model),
    )
    .await;
    assert_eq!(events[0].error_code, Some(HandlerErrorCode::InvalidRequest));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_tag_update_replaces_keys() {
    let backend = sandbox(0);
    let dispatcher = dispatcher(&backend);
    let before = BTreeMap::from([("a".to_string(), "1".to_string())]);
    let after = BTreeMap::from([("b".to_string(), "2".to_string())]);

    let created = drive(
        &dispatcher,
        HandlerRequest::new(Action::Create, PERMISSION_SET, permission_set(&before)),
    )
    .await;
    let created = created.last().unwrap().resource_model.clone().unwrap();
    let arn = created["PermissionSetArn"].clone();
    backend.clear_calls();

    let mut desired = permission_set(&after);
    desired["PermissionSetArn"] = arn.clone();
    let events = drive(
        &dispatcher,
        HandlerRequest::new(Action::Update, PERMISSION_SET, desired).with_previous(created),
    )
    .await;

    let last = events.last().unwrap();
    assert_eq!(last.status, OperationStatus::Success);
    assert_eq!(last.resource_model.as_ref().unwrap()["Tags"], json!([{"Key": "b", "Value": "2"}]));
    assert_eq!(backend.calls_to(Operation::UntagResource), 1);
    assert_eq!(backend.calls_to(Operation::TagResource), 1);

    let arn = ssoa_id::PermissionSetArn::parse(arn.as_str().unwrap()).unwrap();
    assert_eq!(backend.snapshot().tags_of(&arn), after);
    assert!(backend.snapshot().is_provisioned(&arn));
}

#[tokio::test]
async fn test_permission_set_create_reports_arn_while_in_progress() {
    let backend = sandbox(1);
    let dispatcher = dispatcher(&backend);

    let events = drive(
        &dispatcher,
        HandlerRequest::new(
            Action::Create,
            PERMISSION_SET,
            permission_set(&BTreeMap::new()),
        ),
    )
    .await;

    assert_eq!(
        statuses(&events),
        vec![OperationStatus::InProgress, OperationStatus::Success]
    );
    let pending = events[0].resource_model.as_ref().unwrap();
    let done = events[1].resource_model.as_ref().unwrap();
    assert!(pending["PermissionSetArn"].is_string());
    assert_eq!(pending["PermissionSetArn"], done["PermissionSetArn"]);
    assert_eq!(backend.calls_to(Operation::ProvisionPermissionSet), 1);
}

fn tag_map() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[a-e]", "[0-2]", 0..5)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever tags a permission set starts with, an update leaves exactly
    /// the desired tags.
    #[test]
    fn prop_tag_update_converges(before in tag_map(), after in tag_map()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let backend = sandbox(0);
            let dispatcher = dispatcher(&backend);
            let created = drive(
                &dispatcher,
                HandlerRequest::new(Action::Create, PERMISSION_SET, permission_set(&before)),
            )
            .await;
            let created = created.last().unwrap().resource_model.clone().unwrap();

            let mut desired = permission_set(&after);
            desired["PermissionSetArn"] = created["PermissionSetArn"].clone();
            let events = drive(
                &dispatcher,
                HandlerRequest::new(Action::Update, PERMISSION_SET, desired).with_previous(created.clone()),
            )
            .await;
            prop_assert_eq!(events.last().unwrap().status, OperationStatus::Success);

            let arn = ssoa_id::PermissionSetArn::parse(created["PermissionSetArn"].as_str().unwrap()).unwrap();
            prop_assert_eq!(backend.snapshot().tags_of(&arn), after);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
