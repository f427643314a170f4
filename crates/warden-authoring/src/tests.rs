//! Wizard flow tests.
//!
//! Each test drives a [`Wizard`] the way a front end would and checks the
//! resulting state, draft contents and the requests the gateway saw.

use std::num::NonZeroUsize;

use serde_json::{Value, json};
use warden_abac::target::collect_set;
use warden_abac::{Policy, PolicyId, PolicySetId, Rule, Target};
use warden_sync::testing::MemoryTransport;
use warden_sync::{Gateway, Method, Response, Scope, SieveReadCache, SyncError};

use crate::validation::{Field, FieldError, PolicyFields, PolicySetFields};
use crate::wizard::{Flow, StepInput, StepKind, SubmitOutcome, Wizard, WizardError, WizardState};

// ============================================================================
// Helpers
// ============================================================================

fn gateway() -> Gateway<MemoryTransport, SieveReadCache> {
    Gateway::new(
        MemoryTransport::new(),
        SieveReadCache::new(NonZeroUsize::new(16).unwrap()),
        Scope::Member,
    )
}

fn fields() -> PolicyFields {
    PolicyFields {
        actions: collect_set(["read"]),
        resource_type: "document".into(),
        identifiers: collect_set(["*"]),
        attributes: collect_set(["*"]),
        service_providers: collect_set(["did:sp"]),
    }
}

fn exception(id: &str) -> Target {
    Target::new("document")
        .with_actions(["delete"])
        .with_identifiers([id])
        .with_attributes(["*"])
}

fn add_policy_wizard() -> Wizard {
    Wizard::new(Flow::AddPolicy {
        policy_set_id: PolicySetId::new("set-1"),
    })
}

/// Add-policy wizard parked on the review step with one exception.
fn wizard_at_review() -> Wizard {
    let mut wizard = add_policy_wizard();
    wizard.advance(StepInput::Policy(fields())).unwrap();
    wizard.add_exception(exception("42")).unwrap();
    wizard.advance(StepInput::Continue).unwrap();
    assert_eq!(wizard.current_step(), Some(StepKind::Review));
    wizard
}

fn stored_policy_json() -> Value {
    json!({
        "id": "p-1",
        "actions": ["read"],
        "identifiers": ["*"],
        "resource_type": "document",
        "attributes": ["*"],
        "service_providers": ["did:sp"],
        "rules": [
            { "effect": "Permit" },
            {
                "effect": "Deny",
                "target": {
                    "actions": ["delete"],
                    "resource": { "type": "document", "identifiers": ["42"], "attributes": ["*"] }
                }
            }
        ]
    })
}

// ============================================================================
// Step gating
// ============================================================================

#[test]
fn empty_required_field_keeps_step_one() {
    let mut wizard = add_policy_wizard();
    let mut incomplete = fields();
    incomplete.resource_type = "  ".into();

    let err = wizard.advance(StepInput::Policy(incomplete)).unwrap_err();

    let WizardError::Validation(errors) = err else {
        panic!("expected validation errors");
    };
    assert_eq!(errors.get(Field::ResourceType), &[FieldError::Required]);
    assert_eq!(wizard.state(), WizardState::Step(1));
    assert!(wizard.draft().policy().unwrap().target.resource_type.is_empty());
}

#[test]
fn complete_step_one_moves_on_and_merges_values() {
    let mut wizard = add_policy_wizard();

    let state = wizard.advance(StepInput::Policy(fields())).unwrap();

    assert_eq!(state, WizardState::Step(2));
    let policy = wizard.draft().policy().unwrap();
    assert_eq!(policy.target, fields().target());
    assert_eq!(policy.service_providers, collect_set(["did:sp"]));
    assert_eq!(policy.rules(), &[Rule::Permit]);
}

#[test]
fn retreat_keeps_entered_values() {
    let mut wizard = add_policy_wizard();
    wizard.advance(StepInput::Policy(fields())).unwrap();
    wizard.add_exception(exception("42")).unwrap();

    assert_eq!(wizard.retreat().unwrap(), WizardState::Step(1));
    assert_eq!(wizard.draft().policy().unwrap().exception_count(), 1);
    assert_eq!(wizard.draft().policy().unwrap().target, fields().target());

    assert!(matches!(
        wizard.retreat(),
        Err(WizardError::InvalidTransition { .. })
    ));
}

#[test]
fn wrong_input_for_step_is_rejected() {
    let mut wizard = add_policy_wizard();

    assert!(matches!(
        wizard.advance(StepInput::Continue),
        Err(WizardError::UnexpectedInput {
            step: StepKind::DefinePolicy
        })
    ));
    assert!(matches!(
        wizard.advance(StepInput::PolicySet(PolicySetFields::default())),
        Err(WizardError::UnexpectedInput { .. })
    ));
    assert_eq!(wizard.state(), WizardState::Step(1));
}

#[test]
fn invalid_exception_is_not_appended() {
    let mut wizard = add_policy_wizard();
    wizard.advance(StepInput::Policy(fields())).unwrap();

    let mixed = exception("42").with_identifiers(["*", "42"]);
    let err = wizard.add_exception(mixed).unwrap_err();

    let WizardError::Validation(errors) = err else {
        panic!("expected validation errors");
    };
    assert_eq!(errors.get(Field::Identifiers), &[FieldError::MixedWildcard]);
    assert_eq!(wizard.draft().policy().unwrap().exception_count(), 0);
    assert_eq!(wizard.state(), WizardState::Step(2));
}

#[test]
fn exception_resource_type_is_trimmed() {
    let mut wizard = add_policy_wizard();
    wizard.advance(StepInput::Policy(fields())).unwrap();

    let mut padded = exception("42");
    padded.resource_type = "  document \t".into();
    wizard.add_exception(padded).unwrap();

    let policy = wizard.draft().policy().unwrap();
    assert_eq!(policy.exceptions().next(), Some(&exception("42")));
}

#[test]
fn blank_exception_resource_type_is_required() {
    let mut wizard = add_policy_wizard();
    wizard.advance(StepInput::Policy(fields())).unwrap();

    let mut blank = exception("42");
    blank.resource_type = "   ".into();
    let err = wizard.add_exception(blank).unwrap_err();

    let WizardError::Validation(errors) = err else {
        panic!("expected validation errors");
    };
    assert_eq!(errors.get(Field::ResourceType), &[FieldError::Required]);
    assert_eq!(wizard.draft().policy().unwrap().exception_count(), 0);
}

#[test]
fn exceptions_only_on_their_step() {
    let mut wizard = add_policy_wizard();
    assert!(matches!(
        wizard.add_exception(exception("1")),
        Err(WizardError::InvalidTransition { .. })
    ));
}

#[test]
fn exception_loop_appends_and_removes_in_order() {
    let mut wizard = add_policy_wizard();
    wizard.advance(StepInput::Policy(fields())).unwrap();

    assert_eq!(wizard.add_exception(exception("1")).unwrap(), 1);
    assert_eq!(wizard.add_exception(exception("2")).unwrap(), 2);
    assert_eq!(wizard.add_exception(exception("3")).unwrap(), 3);
    assert_eq!(wizard.remove_exception(1).unwrap(), exception("2"));

    assert!(matches!(
        wizard.remove_exception(5),
        Err(WizardError::Draft(_))
    ));

    let policy = wizard.draft().policy().unwrap();
    assert_eq!(
        policy.exceptions().cloned().collect::<Vec<_>>(),
        vec![exception("1"), exception("3")]
    );
    // Still in the loop until an explicit Continue.
    assert_eq!(wizard.current_step(), Some(StepKind::AddExceptions));
}

#[test]
fn advancing_past_review_is_invalid() {
    let mut wizard = wizard_at_review();
    assert!(matches!(
        wizard.advance(StepInput::Continue),
        Err(WizardError::InvalidTransition { .. })
    ));
}

#[test]
fn submit_before_review_is_invalid() {
    let mut wizard = add_policy_wizard();
    assert!(matches!(
        wizard.begin_submit(),
        Err(WizardError::InvalidTransition { .. })
    ));
    assert_eq!(wizard.state(), WizardState::Step(1));
}

// ============================================================================
// Submission
// ============================================================================

#[tokio::test]
async fn successful_submit_clears_draft_and_ends_flow() {
    let gw = gateway();
    gw.transport().respond_json(200, &stored_policy_json());
    let mut wizard = wizard_at_review();

    let outcome = wizard.submit(&gw).await.unwrap();

    let SubmitOutcome::PolicyAdded(Some(stored)) = outcome else {
        panic!("expected PolicyAdded with the stored policy");
    };
    assert_eq!(stored.id, PolicyId::new("p-1"));
    assert_eq!(stored.policy.rules().len(), 2);
    assert_eq!(wizard.state(), WizardState::Submitted);
    assert!(wizard.draft().draft().is_none());
    assert!(wizard.last_error().is_none());

    let request = &gw.transport().requests()[0];
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.path(), "/policy-set/set-1/policy");
}

#[tokio::test]
async fn accepted_submit_without_body_ends_the_flow() {
    let gw = gateway();
    gw.transport().respond(Response::new(201, ""));
    let mut wizard = wizard_at_review();

    let outcome = wizard.submit(&gw).await.unwrap();

    assert_eq!(outcome, SubmitOutcome::PolicyAdded(None));
    assert_eq!(wizard.state(), WizardState::Submitted);
    assert!(wizard.draft().draft().is_none());
    assert!(wizard.last_error().is_none());

    // Nothing left to resend.
    assert!(matches!(
        wizard.submit(&gw).await,
        Err(WizardError::InvalidTransition { .. })
    ));
    assert_eq!(gw.transport().request_count(), 1);
}

#[tokio::test]
async fn second_submit_while_pending_is_rejected() {
    let gw = gateway();
    gw.transport().respond_json(200, &stored_policy_json());
    let mut wizard = wizard_at_review();

    let submission = wizard.begin_submit().unwrap();
    assert_eq!(wizard.state(), WizardState::Submitting);

    assert!(matches!(
        wizard.begin_submit(),
        Err(WizardError::OperationInProgress)
    ));
    assert!(matches!(
        wizard.submit(&gw).await,
        Err(WizardError::OperationInProgress)
    ));
    assert!(matches!(
        wizard.retreat(),
        Err(WizardError::OperationInProgress)
    ));

    let result = submission.send(&gw).await;
    wizard.complete_submit(result).unwrap();

    assert_eq!(gw.transport().request_count(), 1);
    assert_eq!(wizard.state(), WizardState::Submitted);
}

#[tokio::test]
async fn failed_submit_returns_to_review_with_draft_intact() {
    let gw = gateway();
    gw.transport()
        .respond(Response::new(503, "registry down"))
        .respond_json(200, &stored_policy_json());
    let mut wizard = wizard_at_review();
    let before = wizard.draft().policy().cloned();

    let err = wizard.submit(&gw).await.unwrap_err();

    assert!(matches!(err, WizardError::Sync(_)));
    assert_eq!(wizard.current_step(), Some(StepKind::Review));
    assert_eq!(wizard.draft().policy().cloned(), before);
    assert!(matches!(
        wizard.last_error(),
        Some(SyncError::Status { status: 503, .. })
    ));

    // Retry without re-entering anything.
    wizard.submit(&gw).await.unwrap();
    assert_eq!(wizard.state(), WizardState::Submitted);
    assert!(wizard.last_error().is_none());
    assert_eq!(gw.transport().request_count(), 2);
}

#[tokio::test]
async fn submitted_is_terminal() {
    let gw = gateway();
    gw.transport().respond_json(200, &stored_policy_json());
    let mut wizard = wizard_at_review();
    wizard.submit(&gw).await.unwrap();

    assert!(matches!(
        wizard.submit(&gw).await,
        Err(WizardError::InvalidTransition { .. })
    ));
    assert!(matches!(
        wizard.advance(StepInput::Continue),
        Err(WizardError::InvalidTransition { .. })
    ));
    assert!(matches!(
        wizard.retreat(),
        Err(WizardError::InvalidTransition { .. })
    ));
    assert_eq!(gw.transport().request_count(), 1);
}

#[tokio::test]
async fn edit_flow_replaces_the_seeded_policy() {
    let gw = gateway();
    gw.transport().respond_json(200, &stored_policy_json());

    let seed = Policy::new(fields().target())
        .with_service_providers(["did:sp"])
        .with_exception(exception("7"));
    let mut wizard = Wizard::new(Flow::EditPolicy {
        policy_set_id: PolicySetId::new("set-1"),
        policy_id: PolicyId::new("p-1"),
        seed,
    });

    let seeded = PolicyFields::from_policy(wizard.draft().policy().unwrap());
    assert_eq!(seeded, fields());
    wizard.advance(StepInput::Policy(seeded)).unwrap();
    wizard.remove_exception(0).unwrap();
    wizard.add_exception(exception("42")).unwrap();
    wizard.advance(StepInput::Continue).unwrap();

    let outcome = wizard.submit(&gw).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::PolicyReplaced(_)));

    let request = &gw.transport().requests()[0];
    assert_eq!(request.method, Method::Put);
    assert_eq!(request.path(), "/policy-set/set-1/policy/p-1");
    let body = request.body.as_ref().unwrap();
    assert_eq!(
        body["rules"][1]["target"]["resource"]["identifiers"],
        json!(["42"])
    );
}

#[tokio::test]
async fn new_policy_set_flow() {
    let gw = gateway();
    gw.transport().respond_json(
        201,
        &json!({
            "policy_set_id": "set-9",
            "policies": [stored_policy_json()],
            "access_subject": "did:subject",
            "policy_issuer": "did:issuer"
        }),
    );

    let mut wizard = Wizard::new(Flow::NewPolicySet);
    assert!(matches!(
        wizard.advance(StepInput::PolicySet(PolicySetFields::new("did:issuer", ""))),
        Err(WizardError::Validation(_))
    ));
    wizard
        .advance(StepInput::PolicySet(PolicySetFields::new(
            "did:issuer",
            "did:subject",
        )))
        .unwrap();

    // A policy with an incomplete exception is refused.
    let broken = Policy::new(fields().target())
        .with_service_providers(["did:sp"])
        .with_exception(Target::new("document"));
    assert!(matches!(
        wizard.add_policy(broken),
        Err(WizardError::Validation(_))
    ));

    let policy = Policy::new(fields().target())
        .with_service_providers(["did:sp"])
        .with_exception(exception("42"));
    assert_eq!(wizard.add_policy(policy).unwrap(), 1);
    wizard.advance(StepInput::Continue).unwrap();

    let outcome = wizard.submit(&gw).await.unwrap();
    let SubmitOutcome::PolicySetCreated(Some(stored)) = outcome else {
        panic!("expected PolicySetCreated with the stored set");
    };
    assert_eq!(stored.id, PolicySetId::new("set-9"));

    let body = gw.transport().requests()[0].body.clone().unwrap();
    assert_eq!(body["policyIssuer"], json!("did:issuer"));
    assert_eq!(body["policies"].as_array().unwrap().len(), 1);
}
