//! Registry wire shapes and the rule compiler.
//!
//! Outbound, a policy is grouped as
//! `{ rules, target: { actions, resource: { type, identifiers, attributes }, environment: { serviceProviders } } }`.
//! Inbound, the registry answers with flat records (`resource_type`,
//! `service_providers`, ...) that share the same rule encoding.
//!
//! Parsing goes through serde into the payload types first and only then into
//! the model, so a response either yields a complete entity or a
//! [`ParseError`]; nothing is half-populated.

use std::collections::BTreeSet;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ids::{PolicyId, PolicySetId};
use crate::policy::{Policy, PolicySet, Rule, RuleSequenceError, StoredPolicy, StoredPolicySet};
use crate::target::Target;

/// Delegation depth sent with every new policy set.
pub const MAX_DELEGATION_DEPTH: u32 = 1;

// ============================================================================
// Errors
// ============================================================================

/// The kind of entity a parse was attempting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Policy,
    StoredPolicy,
    PolicySet,
    PolicySetList,
}

impl Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Policy => write!(f, "policy"),
            Self::StoredPolicy => write!(f, "stored policy"),
            Self::PolicySet => write!(f, "policy set"),
            Self::PolicySetList => write!(f, "policy set list"),
        }
    }
}

/// A registry document that does not match the canonical shape.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed {entity}: {source}")]
    Shape {
        entity: Entity,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid rule sequence in {entity}: {source}")]
    Rules {
        entity: Entity,
        #[source]
        source: RuleSequenceError,
    },
}

impl ParseError {
    pub fn entity(&self) -> Entity {
        match self {
            Self::Shape { entity, .. } | Self::Rules { entity, .. } => *entity,
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// `resource` group of a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePayload {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub identifiers: BTreeSet<String>,
    pub attributes: BTreeSet<String>,
}

/// `environment` group of a policy target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentPayload {
    pub service_providers: BTreeSet<String>,
}

/// Target of a Deny rule. Exceptions carry no environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionTargetPayload {
    pub actions: BTreeSet<String>,
    pub resource: ResourcePayload,
}

/// Target of a policy, including its environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTargetPayload {
    pub actions: BTreeSet<String>,
    pub resource: ResourcePayload,
    pub environment: EnvironmentPayload,
}

/// Rule encoding shared by requests and responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect")]
pub enum RulePayload {
    Permit,
    Deny { target: ExceptionTargetPayload },
}

/// Body of add-policy and replace-policy requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPayload {
    pub rules: Vec<RulePayload>,
    pub target: PolicyTargetPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySetTargetPayload {
    pub access_subject: String,
}

/// Body of a create-policy-set request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySetPayload {
    pub target: PolicySetTargetPayload,
    pub licences: Vec<Value>,
    pub max_delegation_depth: u32,
    pub policy_issuer: String,
    pub policies: Vec<PolicyPayload>,
}

/// Policy record as returned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub id: PolicyId,
    pub actions: BTreeSet<String>,
    pub identifiers: BTreeSet<String>,
    pub resource_type: String,
    pub attributes: BTreeSet<String>,
    pub service_providers: BTreeSet<String>,
    pub rules: Vec<RulePayload>,
}

/// Policy-set record (with its policies) as returned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySetRecord {
    pub policy_set_id: PolicySetId,
    pub policies: Vec<PolicyRecord>,
    pub access_subject: String,
    pub policy_issuer: String,
}

// ============================================================================
// Compile
// ============================================================================

/// Compiles a policy into the nested request shape.
pub fn compile(policy: &Policy) -> PolicyPayload {
    PolicyPayload {
        rules: policy.rules().iter().map(compile_rule).collect(),
        target: PolicyTargetPayload {
            actions: policy.target.actions.clone(),
            resource: compile_resource(&policy.target),
            environment: EnvironmentPayload {
                service_providers: policy.service_providers.clone(),
            },
        },
    }
}

/// Compiles a policy set into the create-policy-set request shape.
pub fn compile_policy_set(set: &PolicySet) -> PolicySetPayload {
    PolicySetPayload {
        target: PolicySetTargetPayload {
            access_subject: set.access_subject.clone(),
        },
        licences: Vec::new(),
        max_delegation_depth: MAX_DELEGATION_DEPTH,
        policy_issuer: set.policy_issuer.clone(),
        policies: set.policies.iter().map(compile).collect(),
    }
}

fn compile_rule(rule: &Rule) -> RulePayload {
    match rule {
        Rule::Permit => RulePayload::Permit,
        Rule::Deny { target } => RulePayload::Deny {
            target: ExceptionTargetPayload {
                actions: target.actions.clone(),
                resource: compile_resource(target),
            },
        },
    }
}

fn compile_resource(target: &Target) -> ResourcePayload {
    ResourcePayload {
        resource_type: target.resource_type.clone(),
        identifiers: target.identifiers.clone(),
        attributes: target.attributes.clone(),
    }
}

// ============================================================================
// Parse
// ============================================================================

/// Parses a nested policy payload (the inverse of [`compile`]).
///
/// # Errors
///
/// Returns [`ParseError`] on any shape mismatch or on a rule sequence that
/// breaks the Permit-first invariant.
pub fn parse(value: Value) -> Result<Policy, ParseError> {
    let payload: PolicyPayload = from_value(value, Entity::Policy)?;
    policy_from_payload(payload, Entity::Policy)
}

/// Parses a flat policy record returned by the registry.
///
/// # Errors
///
/// Returns [`ParseError`] on any shape mismatch or invalid rule sequence.
pub fn parse_stored_policy(value: Value) -> Result<StoredPolicy, ParseError> {
    let record: PolicyRecord = from_value(value, Entity::StoredPolicy)?;
    stored_policy_from_record(record, Entity::StoredPolicy)
}

/// Parses a policy-set record returned by the registry.
///
/// # Errors
///
/// Returns [`ParseError`] if the set or any of its policies is malformed.
pub fn parse_policy_set(value: Value) -> Result<StoredPolicySet, ParseError> {
    let record: PolicySetRecord = from_value(value, Entity::PolicySet)?;
    policy_set_from_record(record, Entity::PolicySet)
}

/// Parses a list of policy-set records.
///
/// # Errors
///
/// Returns [`ParseError`] if any element is malformed; no partial list is
/// produced.
pub fn parse_policy_sets(value: Value) -> Result<Vec<StoredPolicySet>, ParseError> {
    let records: Vec<PolicySetRecord> = from_value(value, Entity::PolicySetList)?;
    records
        .into_iter()
        .map(|r| policy_set_from_record(r, Entity::PolicySetList))
        .collect()
}

fn from_value<T: serde::de::DeserializeOwned>(
    value: Value,
    entity: Entity,
) -> Result<T, ParseError> {
    serde_json::from_value(value).map_err(|source| ParseError::Shape { entity, source })
}

fn policy_from_payload(payload: PolicyPayload, entity: Entity) -> Result<Policy, ParseError> {
    let PolicyPayload { rules, target } = payload;
    let policy_target = Target {
        actions: target.actions,
        resource_type: target.resource.resource_type,
        identifiers: target.resource.identifiers,
        attributes: target.resource.attributes,
    };

    Policy::from_rules(
        policy_target,
        target.environment.service_providers,
        rules.into_iter().map(rule_from_payload).collect(),
    )
    .map_err(|source| ParseError::Rules { entity, source })
}

fn stored_policy_from_record(
    record: PolicyRecord,
    entity: Entity,
) -> Result<StoredPolicy, ParseError> {
    let target = Target {
        actions: record.actions,
        resource_type: record.resource_type,
        identifiers: record.identifiers,
        attributes: record.attributes,
    };

    let policy = Policy::from_rules(
        target,
        record.service_providers,
        record.rules.into_iter().map(rule_from_payload).collect(),
    )
    .map_err(|source| ParseError::Rules { entity, source })?;

    Ok(StoredPolicy {
        id: record.id,
        policy,
    })
}

fn policy_set_from_record(
    record: PolicySetRecord,
    entity: Entity,
) -> Result<StoredPolicySet, ParseError> {
    let policies = record
        .policies
        .into_iter()
        .map(|p| stored_policy_from_record(p, entity))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StoredPolicySet {
        id: record.policy_set_id,
        policy_issuer: record.policy_issuer,
        access_subject: record.access_subject,
        policies,
    })
}

fn rule_from_payload(rule: RulePayload) -> Rule {
    match rule {
        RulePayload::Permit => Rule::Permit,
        RulePayload::Deny { target } => Rule::deny(Target {
            actions: target.actions,
            resource_type: target.resource.resource_type,
            identifiers: target.resource.identifiers,
            attributes: target.resource.attributes,
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================
