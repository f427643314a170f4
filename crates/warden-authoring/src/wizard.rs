//! Step-sequenced authoring flows.
//!
//! [`StepMachine`] is the pure transition core: it knows the step list of a
//! flow and the `Step(n) → Submitting → Submitted` lifecycle, nothing else.
//! [`Wizard`] wraps it with a [`DraftStore`], runs validation on `advance`
//! and talks to the gateway on submit.
//!
//! ```text
//!   Step(1) ──advance──► Step(2) ──advance──► Step(K) ──begin_submit──► Submitting
//!      ▲                   │  ▲                 │                          │
//!      └─────retreat───────┘  └────retreat──────┘       ◄── failure ───────┤
//!                                                                          │ success
//!                                                                          ▼
//!                                                                      Submitted
//! ```
//!
//! Submission is split in two so the `Submitting` guard is observable:
//! [`Wizard::begin_submit`] (synchronous state check and snapshot),
//! [`Submission::send`] (the only suspension point) and
//! [`Wizard::complete_submit`]. [`Wizard::submit`] chains the three.

use std::fmt::{self, Display};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use warden_abac::{
    Policy, PolicyId, PolicySet, PolicySetId, StoredPolicy, StoredPolicySet, Target,
};
use warden_sync::{Gateway, ReadCache, SyncError, Transport};

use crate::draft::{Committed, DraftError, DraftStore};
use crate::validation::{
    FieldErrors, PolicyFields, PolicySetFields, validate_policy, validate_policy_fields,
    validate_policy_set_fields, validate_target,
};

// ============================================================================
// States and steps
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WizardState {
    /// 1-based step number.
    Step(usize),
    Submitting,
    Submitted,
}

impl Display for WizardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step(n) => write!(f, "step {n}"),
            Self::Submitting => write!(f, "submitting"),
            Self::Submitted => write!(f, "submitted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    DefinePolicy,
    AddExceptions,
    DefinePolicySet,
    AddPolicies,
    Review,
}

impl Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DefinePolicy => "define policy",
            Self::AddExceptions => "add exceptions",
            Self::DefinePolicySet => "define policy set",
            Self::AddPolicies => "add policies",
            Self::Review => "review",
        };
        f.write_str(name)
    }
}

const POLICY_STEPS: &[StepKind] = &[
    StepKind::DefinePolicy,
    StepKind::AddExceptions,
    StepKind::Review,
];
const POLICY_SET_STEPS: &[StepKind] = &[
    StepKind::DefinePolicySet,
    StepKind::AddPolicies,
    StepKind::Review,
];

/// What is being authored, and where it goes on submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// New policy added to an existing set.
    AddPolicy { policy_set_id: PolicySetId },
    /// Existing policy replaced; the draft starts from `seed`.
    EditPolicy {
        policy_set_id: PolicySetId,
        policy_id: PolicyId,
        seed: Policy,
    },
    /// New policy set with its initial policies.
    NewPolicySet,
}

impl Flow {
    pub fn steps(&self) -> &'static [StepKind] {
        match self {
            Self::AddPolicy { .. } | Self::EditPolicy { .. } => POLICY_STEPS,
            Self::NewPolicySet => POLICY_SET_STEPS,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum WizardError {
    /// One or more fields failed; the state did not change.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// A submission is already in flight.
    #[error("a submission is already in progress")]
    OperationInProgress,

    #[error("cannot {action} in {state}")]
    InvalidTransition {
        state: WizardState,
        action: &'static str,
    },

    #[error("input does not belong to the {step} step")]
    UnexpectedInput { step: StepKind },

    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error("submission failed: {0}")]
    Sync(#[source] Arc<SyncError>),
}

// ============================================================================
// StepMachine
// ============================================================================

/// Pure step sequencing for one flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepMachine {
    steps: &'static [StepKind],
    state: WizardState,
}

impl StepMachine {
    pub fn new(steps: &'static [StepKind]) -> Self {
        assert!(!steps.is_empty(), "a flow needs at least one step");
        Self {
            steps,
            state: WizardState::Step(1),
        }
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// The current step, while in `Step(n)`.
    pub fn current_step(&self) -> Option<StepKind> {
        match self.state {
            WizardState::Step(n) => self.steps.get(n - 1).copied(),
            WizardState::Submitting | WizardState::Submitted => None,
        }
    }

    pub fn is_final_step(&self) -> bool {
        self.state == WizardState::Step(self.steps.len())
    }

    pub fn advance(&mut self) -> Result<WizardState, WizardError> {
        match self.state {
            WizardState::Step(n) if n < self.steps.len() => {
                self.transition(WizardState::Step(n + 1))
            }
            state => Err(self.rejected(state, "advance")),
        }
    }

    pub fn retreat(&mut self) -> Result<WizardState, WizardError> {
        match self.state {
            WizardState::Step(n) if n > 1 => self.transition(WizardState::Step(n - 1)),
            state => Err(self.rejected(state, "retreat")),
        }
    }

    /// Final step → `Submitting`.
    pub fn begin_submit(&mut self) -> Result<WizardState, WizardError> {
        if self.is_final_step() {
            self.transition(WizardState::Submitting)
        } else {
            Err(self.rejected(self.state, "submit"))
        }
    }

    /// `Submitting` → `Submitted` on success, back to the final step on
    /// failure.
    pub fn finish_submit(&mut self, succeeded: bool) -> Result<WizardState, WizardError> {
        if self.state != WizardState::Submitting {
            return Err(WizardError::InvalidTransition {
                state: self.state,
                action: "complete a submission",
            });
        }

        let next = if succeeded {
            WizardState::Submitted
        } else {
            WizardState::Step(self.steps.len())
        };
        self.transition(next)
    }

    fn transition(&mut self, next: WizardState) -> Result<WizardState, WizardError> {
        debug!(from = %self.state, to = %next, "wizard transition");
        self.state = next;
        Ok(next)
    }

    fn rejected(&self, state: WizardState, action: &'static str) -> WizardError {
        if state == WizardState::Submitting {
            WizardError::OperationInProgress
        } else {
            WizardError::InvalidTransition { state, action }
        }
    }
}

// ============================================================================
// Submission
// ============================================================================

/// Input for [`Wizard::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepInput {
    /// Values of the "define policy" step.
    Policy(PolicyFields),
    /// Values of the "define policy set" step.
    PolicySet(PolicySetFields),
    /// Explicit completion of a loop step (exceptions, policies).
    Continue,
}

/// An accepted submission. Carries the stored entity when the registry
/// echoed one back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    PolicyAdded(Option<StoredPolicy>),
    PolicyReplaced(Option<StoredPolicy>),
    PolicySetCreated(Option<StoredPolicySet>),
}

/// A snapshot of the draft on its way to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    AddPolicy {
        policy_set_id: PolicySetId,
        policy: Policy,
    },
    ReplacePolicy {
        policy_set_id: PolicySetId,
        policy_id: PolicyId,
        policy: Policy,
    },
    CreatePolicySet {
        policy_set: PolicySet,
    },
}

impl Submission {
    /// Sends the snapshot through `gateway`.
    pub async fn send<T: Transport, C: ReadCache>(
        &self,
        gateway: &Gateway<T, C>,
    ) -> Result<SubmitOutcome, SyncError> {
        match self {
            Self::AddPolicy {
                policy_set_id,
                policy,
            } => gateway
                .add_policy(policy_set_id, policy)
                .await
                .map(SubmitOutcome::PolicyAdded),
            Self::ReplacePolicy {
                policy_set_id,
                policy_id,
                policy,
            } => gateway
                .replace_policy(policy_set_id, policy_id, policy)
                .await
                .map(SubmitOutcome::PolicyReplaced),
            Self::CreatePolicySet { policy_set } => gateway
                .create_policy_set(policy_set)
                .await
                .map(SubmitOutcome::PolicySetCreated),
        }
    }
}

// ============================================================================
// Wizard
// ============================================================================

/// One authoring session: flow, step machine and the draft it owns.
#[derive(Debug)]
pub struct Wizard {
    flow: Flow,
    machine: StepMachine,
    store: DraftStore,
    last_error: Option<Arc<SyncError>>,
}

impl Wizard {
    pub fn new(flow: Flow) -> Self {
        let mut store = DraftStore::new();
        match &flow {
            Flow::AddPolicy { .. } => store.initialize_policy(None),
            Flow::EditPolicy { seed, .. } => store.initialize_policy(Some(seed.clone())),
            Flow::NewPolicySet => store.initialize_policy_set(None),
        }

        Self {
            machine: StepMachine::new(flow.steps()),
            flow,
            store,
            last_error: None,
        }
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub fn state(&self) -> WizardState {
        self.machine.state()
    }

    pub fn current_step(&self) -> Option<StepKind> {
        self.machine.current_step()
    }

    pub fn step_count(&self) -> usize {
        self.machine.step_count()
    }

    /// Read access to the draft.
    pub fn draft(&self) -> &DraftStore {
        &self.store
    }

    /// Error of the most recent failed submission, cleared on success.
    pub fn last_error(&self) -> Option<&SyncError> {
        self.last_error.as_deref()
    }

    /// Validates `input` for the current step, merges it into the draft and
    /// moves on. On validation failure nothing changes.
    pub fn advance(&mut self, input: StepInput) -> Result<WizardState, WizardError> {
        let step = self.editable_step("advance")?;

        match (step, input) {
            (StepKind::DefinePolicy, StepInput::Policy(fields)) => {
                validate_policy_fields(&fields)
                    .into_result()
                    .map_err(|errors| self.invalid(step, errors))?;
                self.store.set_target_fields(fields.into())?;
            }
            (StepKind::DefinePolicySet, StepInput::PolicySet(fields)) => {
                validate_policy_set_fields(&fields)
                    .into_result()
                    .map_err(|errors| self.invalid(step, errors))?;
                self.store.set_policy_set_fields(fields.into())?;
            }
            (
                StepKind::AddExceptions | StepKind::AddPolicies | StepKind::Review,
                StepInput::Continue,
            ) => {}
            (step, _) => return Err(WizardError::UnexpectedInput { step }),
        }

        self.machine.advance()
    }

    /// Goes back one step; entered values stay in the draft.
    pub fn retreat(&mut self) -> Result<WizardState, WizardError> {
        self.editable_step("retreat")?;
        self.machine.retreat()
    }

    /// Validates `target` and appends it as an exception. Returns the new
    /// exception count.
    pub fn add_exception(&mut self, mut target: Target) -> Result<usize, WizardError> {
        self.require_step(StepKind::AddExceptions, "add an exception")?;

        target.resource_type = target.resource_type.trim().to_string();

        validate_target(&target)
            .into_result()
            .map_err(|errors| self.invalid(StepKind::AddExceptions, errors))?;
        self.store.append_exception_rule(target)?;

        Ok(self.store.policy().map_or(0, Policy::exception_count))
    }

    pub fn remove_exception(&mut self, index: usize) -> Result<Target, WizardError> {
        self.require_step(StepKind::AddExceptions, "remove an exception")?;
        Ok(self.store.remove_exception_rule(index)?)
    }

    /// Validates `policy` (fields and exceptions) and appends it to the set
    /// draft. Returns the new policy count.
    pub fn add_policy(&mut self, policy: Policy) -> Result<usize, WizardError> {
        self.require_step(StepKind::AddPolicies, "add a policy")?;

        validate_policy(&policy)
            .into_result()
            .map_err(|errors| self.invalid(StepKind::AddPolicies, errors))?;
        self.store.append_policy(policy)?;

        Ok(self.store.policy_set().map_or(0, |s| s.policies.len()))
    }

    pub fn remove_policy(&mut self, index: usize) -> Result<Policy, WizardError> {
        self.require_step(StepKind::AddPolicies, "remove a policy")?;
        Ok(self.store.remove_policy(index)?)
    }

    /// Enters `Submitting` and snapshots the draft. A second call before
    /// [`complete_submit`](Self::complete_submit) fails with
    /// [`WizardError::OperationInProgress`].
    pub fn begin_submit(&mut self) -> Result<Submission, WizardError> {
        match self.state() {
            WizardState::Submitting => {
                debug!("submit rejected: already in progress");
                return Err(WizardError::OperationInProgress);
            }
            state if !self.machine.is_final_step() => {
                return Err(WizardError::InvalidTransition {
                    state,
                    action: "submit",
                });
            }
            _ => {}
        }

        let snapshot = self.store.commit()?;
        let submission = self.submission_for(snapshot)?;
        self.machine.begin_submit()?;
        Ok(submission)
    }

    /// Applies the outcome of [`Submission::send`]. Success clears the draft
    /// and ends the flow; failure returns to the review step with the error
    /// attached and the draft untouched.
    pub fn complete_submit(
        &mut self,
        result: Result<SubmitOutcome, SyncError>,
    ) -> Result<SubmitOutcome, WizardError> {
        match result {
            Ok(outcome) => {
                self.machine.finish_submit(true)?;
                self.store.clear();
                self.last_error = None;
                info!(flow = self.flow_name(), "submission accepted");
                Ok(outcome)
            }
            Err(error) => {
                self.machine.finish_submit(false)?;
                let error = Arc::new(error);
                warn!(flow = self.flow_name(), error = %error, "submission failed");
                self.last_error = Some(Arc::clone(&error));
                Err(WizardError::Sync(error))
            }
        }
    }

    /// Submits the draft through `gateway`.
    pub async fn submit<T: Transport, C: ReadCache>(
        &mut self,
        gateway: &Gateway<T, C>,
    ) -> Result<SubmitOutcome, WizardError> {
        let submission = self.begin_submit()?;
        let result = submission.send(gateway).await;
        self.complete_submit(result)
    }

    /// Ends the session, discarding the draft. A request already sent still
    /// completes on the registry.
    pub fn abandon(mut self) {
        debug!(state = %self.state(), "wizard abandoned");
        self.store.clear();
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn editable_step(&self, action: &'static str) -> Result<StepKind, WizardError> {
        match self.state() {
            WizardState::Submitting => Err(WizardError::OperationInProgress),
            state => self
                .current_step()
                .ok_or(WizardError::InvalidTransition { state, action }),
        }
    }

    fn require_step(&self, expected: StepKind, action: &'static str) -> Result<(), WizardError> {
        let step = self.editable_step(action)?;
        if step == expected {
            Ok(())
        } else {
            Err(WizardError::InvalidTransition {
                state: self.state(),
                action,
            })
        }
    }

    fn invalid(&self, step: StepKind, errors: FieldErrors) -> WizardError {
        debug!(step = %step, errors = %errors, "step validation failed");
        WizardError::Validation(errors)
    }

    fn submission_for(&self, snapshot: Committed) -> Result<Submission, WizardError> {
        match (&self.flow, snapshot) {
            (Flow::AddPolicy { policy_set_id }, Committed::Policy(policy)) => {
                Ok(Submission::AddPolicy {
                    policy_set_id: policy_set_id.clone(),
                    policy,
                })
            }
            (
                Flow::EditPolicy {
                    policy_set_id,
                    policy_id,
                    ..
                },
                Committed::Policy(policy),
            ) => Ok(Submission::ReplacePolicy {
                policy_set_id: policy_set_id.clone(),
                policy_id: policy_id.clone(),
                policy,
            }),
            (Flow::NewPolicySet, Committed::PolicySet(policy_set)) => {
                Ok(Submission::CreatePolicySet { policy_set })
            }
            _ => Err(DraftError::InvalidOperation {
                operation: "submit",
                reason: "the draft does not match the flow",
            }
            .into()),
        }
    }

    fn flow_name(&self) -> &'static str {
        match self.flow {
            Flow::AddPolicy { .. } => "add-policy",
            Flow::EditPolicy { .. } => "edit-policy",
            Flow::NewPolicySet => "new-policy-set",
        }
    }
}
