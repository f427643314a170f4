//! # warden-authoring: Guided policy authoring
//!
//! The authoring core: field validation, the draft store owning one
//! in-progress policy or policy set, and the step wizard that gates the
//! draft behind validation and submits it through a
//! [`warden_sync::Gateway`].
//!
//! ## Data flow
//!
//! ```text
//! input ─► validation ─► DraftStore ─► Wizard::advance
//!
//! Wizard::submit ─► DraftStore::commit ─► Gateway (compile + send) ─► registry
//! ```
//!
//! ## Example
//!
//! ```
//! use warden_abac::PolicySetId;
//! use warden_abac::target::collect_set;
//! use warden_authoring::{Flow, PolicyFields, StepInput, Wizard, WizardState};
//!
//! let mut wizard = Wizard::new(Flow::AddPolicy {
//!     policy_set_id: PolicySetId::new("set-1"),
//! });
//!
//! // Empty required fields keep the wizard on step 1.
//! assert!(wizard.advance(StepInput::Policy(PolicyFields::default())).is_err());
//! assert_eq!(wizard.state(), WizardState::Step(1));
//!
//! let fields = PolicyFields {
//!     actions: collect_set(["read"]),
//!     resource_type: "document".into(),
//!     identifiers: collect_set(["*"]),
//!     attributes: collect_set(["*"]),
//!     service_providers: collect_set(["did:ishare:EU.NL.NTRNL-10000001"]),
//! };
//! assert_eq!(wizard.advance(StepInput::Policy(fields)).unwrap(), WizardState::Step(2));
//! ```

pub mod draft;
pub mod validation;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use draft::{Committed, Draft, DraftError, DraftStore, PolicyPatch, PolicySetPatch};
pub use validation::{
    Field, FieldError, FieldErrors, PolicyFields, PolicySetFields, validate_policy,
    validate_policy_fields, validate_policy_set_fields, validate_required, validate_target,
    validate_wildcard,
};
pub use wizard::{
    Flow, StepInput, StepKind, StepMachine, SubmitOutcome, Submission, Wizard, WizardError,
    WizardState,
};
