//! Policy and policy-set definitions.
//!
//! A policy grants its target through a single leading `Permit` rule and
//! carves exceptions out of it with `Deny` rules. The rule sequence is kept
//! private so the leading-permit invariant cannot be broken from outside:
//! [`Policy::new`] installs the permit and [`Policy::from_rules`] checks a
//! sequence received from elsewhere.

use std::collections::BTreeSet;
use std::fmt::{self, Display};

use thiserror::Error;

use crate::ids::{PolicyId, PolicySetId};
use crate::target::{Target, collect_set};

// ============================================================================
// Effect
// ============================================================================

/// The outcome a rule asserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    /// Grants the policy target.
    Permit,
    /// Withdraws the rule's own target from the grant.
    Deny,
}

impl Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permit => write!(f, "Permit"),
            Self::Deny => write!(f, "Deny"),
        }
    }
}

// ============================================================================
// Rule
// ============================================================================

/// A single rule of a policy.
///
/// `Permit` carries no target: it inherits the policy's own target fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rule {
    Permit,
    Deny { target: Target },
}

impl Rule {
    pub fn deny(target: Target) -> Self {
        Self::Deny { target }
    }

    pub fn effect(&self) -> Effect {
        match self {
            Self::Permit => Effect::Permit,
            Self::Deny { .. } => Effect::Deny,
        }
    }

    /// The exception target, for `Deny` rules.
    pub fn exception_target(&self) -> Option<&Target> {
        match self {
            Self::Permit => None,
            Self::Deny { target } => Some(target),
        }
    }
}

/// A rule sequence that cannot belong to a policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleSequenceError {
    #[error("rule sequence is empty; a policy starts with its Permit rule")]
    Empty,

    #[error("first rule must be Permit, found {found}")]
    PermitNotFirst { found: Effect },

    #[error("rule {index} is a second Permit; only Deny rules may follow the first rule")]
    DuplicatePermit { index: usize },
}

// ============================================================================
// Policy
// ============================================================================

/// An access policy: a target granted by `rules[0]` minus the targets of the
/// exception rules `rules[1..]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
    /// Scope granted by the leading Permit rule.
    pub target: Target,
    /// Service providers the grant applies to (the target environment).
    pub service_providers: BTreeSet<String>,
    rules: Vec<Rule>,
}

impl Policy {
    /// Creates a policy granting `target`, with no exceptions yet.
    pub fn new(target: Target) -> Self {
        Self {
            target,
            service_providers: BTreeSet::new(),
            rules: vec![Rule::Permit],
        }
    }

    /// Rebuilds a policy from a complete rule sequence.
    ///
    /// # Errors
    ///
    /// Fails if the sequence is empty, does not start with `Permit`, or holds
    /// a second `Permit`.
    pub fn from_rules(
        target: Target,
        service_providers: BTreeSet<String>,
        rules: Vec<Rule>,
    ) -> Result<Self, RuleSequenceError> {
        match rules.first() {
            None => return Err(RuleSequenceError::Empty),
            Some(Rule::Deny { .. }) => {
                return Err(RuleSequenceError::PermitNotFirst {
                    found: Effect::Deny,
                });
            }
            Some(Rule::Permit) => {}
        }

        if let Some(index) = rules
            .iter()
            .skip(1)
            .position(|r| r.effect() == Effect::Permit)
        {
            return Err(RuleSequenceError::DuplicatePermit { index: index + 1 });
        }

        Ok(Self {
            target,
            service_providers,
            rules,
        })
    }

    pub fn with_service_providers<I, S>(mut self, service_providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.service_providers = collect_set(service_providers);
        self
    }

    /// Appends an exception rule (builder pattern).
    pub fn with_exception(mut self, target: Target) -> Self {
        self.push_exception(target);
        self
    }

    /// Appends a `Deny` rule after the existing exceptions.
    pub fn push_exception(&mut self, target: Target) {
        self.ensure_permit();
        self.rules.push(Rule::deny(target));
    }

    /// Removes the exception at `index` (0 = the first `Deny` rule).
    ///
    /// Returns `None`, leaving the policy untouched, when `index` is out of
    /// range. The `Permit` rule is not reachable through this method.
    pub fn remove_exception(&mut self, index: usize) -> Option<Target> {
        if index >= self.exception_count() {
            return None;
        }

        match self.rules.remove(index + 1) {
            Rule::Deny { target } => Some(target),
            Rule::Permit => unreachable!("rules[1..] only holds Deny rules"),
        }
    }

    /// The full rule sequence, Permit first.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The exception targets, in insertion order.
    pub fn exceptions(&self) -> impl Iterator<Item = &Target> + '_ {
        self.rules.iter().filter_map(Rule::exception_target)
    }

    pub fn exception_count(&self) -> usize {
        self.rules.len().saturating_sub(1)
    }

    // `Default` produces an empty rule list; the first mutation repairs it.
    fn ensure_permit(&mut self) {
        if self.rules.is_empty() {
            self.rules.push(Rule::Permit);
        }
    }
}

/// A policy as stored by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPolicy {
    pub id: PolicyId,
    pub policy: Policy,
}

// ============================================================================
// PolicySet
// ============================================================================

/// Policies grouped under one (issuer, access subject) pair.
///
/// Targets of different policies may overlap; the registry resolves overlaps
/// through whichever Deny rules match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySet {
    pub policy_issuer: String,
    pub access_subject: String,
    pub policies: Vec<Policy>,
}

impl PolicySet {
    pub fn new(policy_issuer: impl Into<String>, access_subject: impl Into<String>) -> Self {
        Self {
            policy_issuer: policy_issuer.into(),
            access_subject: access_subject.into(),
            policies: Vec::new(),
        }
    }

    /// Adds a policy (builder pattern).
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }
}

/// A policy set as stored by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPolicySet {
    pub id: PolicySetId,
    pub policy_issuer: String,
    pub access_subject: String,
    pub policies: Vec<StoredPolicy>,
}

impl StoredPolicySet {
    /// Drops the registry ids, yielding an editable policy set.
    pub fn to_policy_set(&self) -> PolicySet {
        PolicySet {
            policy_issuer: self.policy_issuer.clone(),
            access_subject: self.access_subject.clone(),
            policies: self.policies.iter().map(|p| p.policy.clone()).collect(),
        }
    }

    pub fn find_policy(&self, id: &PolicyId) -> Option<&StoredPolicy> {
        self.policies.iter().find(|p| &p.id == id)
    }
}

// ============================================================================
// Tests
// ============================================================================
