//! The draft store.
//!
//! Owns the single in-progress policy or policy set of one authoring
//! session. Every operation takes `&mut self`, so there is exactly one
//! writer; no validation happens here (that is gated per wizard step).

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;
use warden_abac::{Policy, PolicySet, Rule, Target};

use crate::validation::{PolicyFields, PolicySetFields};

/// An entity under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Draft {
    Policy(Policy),
    PolicySet(PolicySet),
}

/// An immutable snapshot returned by [`DraftStore::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Committed {
    Policy(Policy),
    PolicySet(PolicySet),
}

/// Partial update of a policy draft's target fields. `None` leaves the field
/// as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyPatch {
    pub actions: Option<BTreeSet<String>>,
    pub resource_type: Option<String>,
    pub identifiers: Option<BTreeSet<String>>,
    pub attributes: Option<BTreeSet<String>>,
    pub service_providers: Option<BTreeSet<String>>,
}

impl From<PolicyFields> for PolicyPatch {
    fn from(fields: PolicyFields) -> Self {
        let target = fields.target();
        Self {
            actions: Some(target.actions),
            resource_type: Some(target.resource_type),
            identifiers: Some(target.identifiers),
            attributes: Some(target.attributes),
            service_providers: Some(fields.service_providers),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySetPatch {
    pub policy_issuer: Option<String>,
    pub access_subject: Option<String>,
}

impl From<PolicySetFields> for PolicySetPatch {
    fn from(fields: PolicySetFields) -> Self {
        Self {
            policy_issuer: Some(fields.policy_issuer.trim().to_string()),
            access_subject: Some(fields.access_subject.trim().to_string()),
        }
    }
}

/// Misuse of the draft store. Correct wizard sequencing never produces these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("cannot {operation}: {reason}")]
    InvalidOperation {
        operation: &'static str,
        reason: &'static str,
    },

    #[error("index {index} out of range for {len} entries")]
    IndexOutOfRange { index: usize, len: usize },
}

// ============================================================================
// DraftStore
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct DraftStore {
    draft: Option<Draft>,
}

impl DraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a policy draft, from `seed` when editing. A fresh draft has
    /// empty fields and its Permit rule in place.
    pub fn initialize_policy(&mut self, seed: Option<Policy>) {
        let policy = seed.unwrap_or_else(|| Policy::new(Target::default()));
        debug!(exceptions = policy.exception_count(), "policy draft initialized");
        self.draft = Some(Draft::Policy(policy));
    }

    pub fn initialize_policy_set(&mut self, seed: Option<PolicySet>) {
        let set = seed.unwrap_or_default();
        debug!(policies = set.policies.len(), "policy set draft initialized");
        self.draft = Some(Draft::PolicySet(set));
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    pub fn policy(&self) -> Option<&Policy> {
        match &self.draft {
            Some(Draft::Policy(policy)) => Some(policy),
            _ => None,
        }
    }

    pub fn policy_set(&self) -> Option<&PolicySet> {
        match &self.draft {
            Some(Draft::PolicySet(set)) => Some(set),
            _ => None,
        }
    }

    /// Merges the `Some` fields of `patch` into the policy draft.
    pub fn set_target_fields(&mut self, patch: PolicyPatch) -> Result<(), DraftError> {
        let policy = self.policy_mut("set target fields")?;

        if let Some(actions) = patch.actions {
            policy.target.actions = actions;
        }
        if let Some(resource_type) = patch.resource_type {
            policy.target.resource_type = resource_type;
        }
        if let Some(identifiers) = patch.identifiers {
            policy.target.identifiers = identifiers;
        }
        if let Some(attributes) = patch.attributes {
            policy.target.attributes = attributes;
        }
        if let Some(service_providers) = patch.service_providers {
            policy.service_providers = service_providers;
        }
        Ok(())
    }

    pub fn set_policy_set_fields(&mut self, patch: PolicySetPatch) -> Result<(), DraftError> {
        let set = self.policy_set_mut("set policy set fields")?;

        if let Some(policy_issuer) = patch.policy_issuer {
            set.policy_issuer = policy_issuer;
        }
        if let Some(access_subject) = patch.access_subject {
            set.access_subject = access_subject;
        }
        Ok(())
    }

    /// Appends a `Deny { target }` rule.
    pub fn append_exception_rule(&mut self, target: Target) -> Result<(), DraftError> {
        const OPERATION: &str = "append exception rule";

        let policy = self.policy_mut(OPERATION)?;
        if policy.rules().first() != Some(&Rule::Permit) {
            return Err(DraftError::InvalidOperation {
                operation: OPERATION,
                reason: "the draft has no Permit rule",
            });
        }

        policy.push_exception(target);
        Ok(())
    }

    /// Removes the exception at `index` (0 = the first Deny rule).
    pub fn remove_exception_rule(&mut self, index: usize) -> Result<Target, DraftError> {
        let policy = self.policy_mut("remove exception rule")?;
        let len = policy.exception_count();

        policy
            .remove_exception(index)
            .ok_or(DraftError::IndexOutOfRange { index, len })
    }

    pub fn append_policy(&mut self, policy: Policy) -> Result<(), DraftError> {
        self.policy_set_mut("append policy")?.policies.push(policy);
        Ok(())
    }

    pub fn remove_policy(&mut self, index: usize) -> Result<Policy, DraftError> {
        let set = self.policy_set_mut("remove policy")?;
        let len = set.policies.len();
        if index >= len {
            return Err(DraftError::IndexOutOfRange { index, len });
        }
        Ok(set.policies.remove(index))
    }

    /// Snapshots the draft. The draft itself stays in place.
    pub fn commit(&self) -> Result<Committed, DraftError> {
        match &self.draft {
            Some(Draft::Policy(policy)) => Ok(Committed::Policy(policy.clone())),
            Some(Draft::PolicySet(set)) => Ok(Committed::PolicySet(set.clone())),
            None => Err(DraftError::InvalidOperation {
                operation: "commit",
                reason: "no draft is initialized",
            }),
        }
    }

    /// Discards the draft.
    pub fn clear(&mut self) {
        if self.draft.take().is_some() {
            debug!("draft discarded");
        }
    }

    fn policy_mut(&mut self, operation: &'static str) -> Result<&mut Policy, DraftError> {
        match &mut self.draft {
            Some(Draft::Policy(policy)) => Ok(policy),
            _ => Err(DraftError::InvalidOperation {
                operation,
                reason: "no policy draft is initialized",
            }),
        }
    }

    fn policy_set_mut(&mut self, operation: &'static str) -> Result<&mut PolicySet, DraftError> {
        match &mut self.draft {
            Some(Draft::PolicySet(set)) => Ok(set),
            _ => Err(DraftError::InvalidOperation {
                operation,
                reason: "no policy set draft is initialized",
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use warden_abac::target::collect_set;

    use super::*;

    fn exception(id: &str) -> Target {
        Target::new("document")
            .with_actions(["delete"])
            .with_identifiers([id])
            .with_attributes(["*"])
    }

    fn policy_store() -> DraftStore {
        let mut store = DraftStore::new();
        store.initialize_policy(None);
        store
    }

    #[test]
    fn fresh_policy_draft_has_permit_and_empty_fields() {
        let store = policy_store();
        let policy = store.policy().unwrap();

        assert_eq!(policy.rules(), &[Rule::Permit]);
        assert!(policy.target.actions.is_empty());
        assert!(policy.target.resource_type.is_empty());
        assert!(policy.service_providers.is_empty());
    }

    #[test]
    fn patch_merges_only_given_fields() {
        let mut store = policy_store();
        store
            .set_target_fields(PolicyPatch {
                actions: Some(collect_set(["read"])),
                resource_type: Some("document".into()),
                ..PolicyPatch::default()
            })
            .unwrap();
        store
            .set_target_fields(PolicyPatch {
                identifiers: Some(collect_set(["*"])),
                ..PolicyPatch::default()
            })
            .unwrap();

        let target = &store.policy().unwrap().target;
        assert_eq!(target.actions, collect_set(["read"]));
        assert_eq!(target.resource_type, "document");
        assert_eq!(target.identifiers, collect_set(["*"]));
    }

    #[test]
    fn append_requires_a_permit_rule() {
        let mut empty = DraftStore::new();
        assert!(matches!(
            empty.append_exception_rule(exception("1")),
            Err(DraftError::InvalidOperation { .. })
        ));

        let mut seeded = DraftStore::new();
        seeded.initialize_policy(Some(Policy::default()));
        assert!(matches!(
            seeded.append_exception_rule(exception("1")),
            Err(DraftError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn remove_out_of_range_leaves_draft_unmodified() {
        let mut store = policy_store();
        store.append_exception_rule(exception("1")).unwrap();
        let before = store.draft().cloned();

        assert_eq!(
            store.remove_exception_rule(1),
            Err(DraftError::IndexOutOfRange { index: 1, len: 1 })
        );
        assert_eq!(store.draft().cloned(), before);
    }

    #[test]
    fn remove_exception_keeps_permit_and_order() {
        let mut store = policy_store();
        for id in ["1", "2", "3"] {
            store.append_exception_rule(exception(id)).unwrap();
        }

        assert_eq!(store.remove_exception_rule(0).unwrap(), exception("1"));

        let policy = store.policy().unwrap();
        assert_eq!(policy.rules()[0], Rule::Permit);
        assert_eq!(
            policy.exceptions().cloned().collect::<Vec<_>>(),
            vec![exception("2"), exception("3")]
        );
    }

    #[test]
    fn policy_operations_reject_set_drafts() {
        let mut store = DraftStore::new();
        store.initialize_policy_set(None);

        assert!(store.set_target_fields(PolicyPatch::default()).is_err());
        assert!(store.remove_exception_rule(0).is_err());
    }

    #[test]
    fn policy_set_draft_lifecycle() {
        let mut store = DraftStore::new();
        store.initialize_policy_set(None);
        store
            .set_policy_set_fields(PolicySetFields::new(" did:issuer ", "did:subject").into())
            .unwrap();
        store.append_policy(Policy::new(exception("a"))).unwrap();
        store.append_policy(Policy::new(exception("b"))).unwrap();

        assert_eq!(
            store.remove_policy(2),
            Err(DraftError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(store.remove_policy(0).unwrap(), Policy::new(exception("a")));

        let Committed::PolicySet(set) = store.commit().unwrap() else {
            panic!("expected a policy set snapshot");
        };
        assert_eq!(set.policy_issuer, "did:issuer");
        assert_eq!(set.policies, vec![Policy::new(exception("b"))]);
    }

    #[test]
    fn commit_does_not_clear() {
        let mut store = policy_store();
        let first = store.commit().unwrap();
        assert_eq!(store.commit().unwrap(), first);

        store.clear();
        assert!(store.draft().is_none());
        assert!(store.commit().is_err());
    }
}
