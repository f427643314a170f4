//! Field validation.
//!
//! Pure functions judging field completeness, called per field (on every
//! edit) and per step (on `advance`). A wildcard set must be exactly
//! `{"*"}`; mixing the sentinel with literal members is rejected.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};

use thiserror::Error;
use warden_abac::target::mixes_wildcard;
use warden_abac::{Policy, PolicySet, Target};

// ============================================================================
// Fields and errors
// ============================================================================

/// A user-editable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Actions,
    ResourceType,
    Identifiers,
    Attributes,
    ServiceProviders,
    PolicyIssuer,
    AccessSubject,
}

impl Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Actions => "actions",
            Self::ResourceType => "resource type",
            Self::Identifiers => "identifiers",
            Self::Attributes => "attributes",
            Self::ServiceProviders => "service providers",
            Self::PolicyIssuer => "policy issuer",
            Self::AccessSubject => "access subject",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum FieldError {
    #[error("required")]
    Required,

    #[error("\"*\" cannot be combined with other values")]
    MixedWildcard,
}

/// Per-field errors of one form, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<Field, Vec<FieldError>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `errors` against `field`. Empty input records nothing.
    pub fn add(&mut self, field: Field, errors: Vec<FieldError>) {
        if errors.is_empty() {
            return;
        }
        let slot = self.0.entry(field).or_default();
        for error in errors {
            if !slot.contains(&error) {
                slot.push(error);
            }
        }
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, errors) in other.0 {
            self.add(field, errors);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn get(&self, field: Field) -> &[FieldError] {
        self.0.get(&field).map_or(&[], Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &[FieldError])> {
        self.0.iter().map(|(f, e)| (*f, e.as_slice()))
    }

    /// `Ok(())` when no field failed.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, errors) in self.iter() {
            for error in errors {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {error}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

// ============================================================================
// Per-field checks
// ============================================================================

/// Values that can be checked for presence.
pub trait Required {
    fn is_present(&self) -> bool;
}

impl Required for str {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl Required for String {
    fn is_present(&self) -> bool {
        self.as_str().is_present()
    }
}

impl<T> Required for BTreeSet<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Required for [T] {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Required for Vec<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

/// Strings must be non-empty after trimming; sets need at least one member.
pub fn validate_required<V: Required + ?Sized>(value: &V) -> Vec<FieldError> {
    if value.is_present() {
        Vec::new()
    } else {
        vec![FieldError::Required]
    }
}

/// Rejects a set holding `"*"` next to literal members.
pub fn validate_wildcard(set: &BTreeSet<String>) -> Vec<FieldError> {
    if mixes_wildcard(set) {
        vec![FieldError::MixedWildcard]
    } else {
        Vec::new()
    }
}

fn validate_set(set: &BTreeSet<String>) -> Vec<FieldError> {
    let mut errors = validate_required(set);
    errors.extend(validate_wildcard(set));
    errors
}

// ============================================================================
// Forms
// ============================================================================

/// Values entered on the "define policy" step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyFields {
    pub actions: BTreeSet<String>,
    pub resource_type: String,
    pub identifiers: BTreeSet<String>,
    pub attributes: BTreeSet<String>,
    pub service_providers: BTreeSet<String>,
}

impl PolicyFields {
    pub fn from_policy(policy: &Policy) -> Self {
        Self {
            actions: policy.target.actions.clone(),
            resource_type: policy.target.resource_type.clone(),
            identifiers: policy.target.identifiers.clone(),
            attributes: policy.target.attributes.clone(),
            service_providers: policy.service_providers.clone(),
        }
    }

    pub fn target(&self) -> Target {
        Target {
            actions: self.actions.clone(),
            resource_type: self.resource_type.trim().to_string(),
            identifiers: self.identifiers.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

/// Values entered on the "define policy set" step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySetFields {
    pub policy_issuer: String,
    pub access_subject: String,
}

impl PolicySetFields {
    pub fn new(policy_issuer: impl Into<String>, access_subject: impl Into<String>) -> Self {
        Self {
            policy_issuer: policy_issuer.into(),
            access_subject: access_subject.into(),
        }
    }

    pub fn from_policy_set(set: &PolicySet) -> Self {
        Self::new(set.policy_issuer.clone(), set.access_subject.clone())
    }
}

/// All five policy fields are required.
pub fn validate_policy_fields(fields: &PolicyFields) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.add(Field::Actions, validate_set(&fields.actions));
    errors.add(Field::ResourceType, validate_required(&fields.resource_type));
    errors.add(
        Field::ServiceProviders,
        validate_required(&fields.service_providers),
    );
    errors.add(Field::Identifiers, validate_set(&fields.identifiers));
    errors.add(Field::Attributes, validate_set(&fields.attributes));
    errors
}

/// Validates an exception target.
pub fn validate_target(target: &Target) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.add(Field::Actions, validate_set(&target.actions));
    errors.add(Field::ResourceType, validate_required(&target.resource_type));
    errors.add(Field::Identifiers, validate_set(&target.identifiers));
    errors.add(Field::Attributes, validate_set(&target.attributes));
    errors
}

pub fn validate_policy_set_fields(fields: &PolicySetFields) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.add(Field::PolicyIssuer, validate_required(&fields.policy_issuer));
    errors.add(Field::AccessSubject, validate_required(&fields.access_subject));
    errors
}

/// Validates a complete policy: its own fields plus every exception target.
/// Exception errors are reported against the same field names.
pub fn validate_policy(policy: &Policy) -> FieldErrors {
    let mut errors = validate_policy_fields(&PolicyFields::from_policy(policy));
    for target in policy.exceptions() {
        errors.merge(validate_target(target));
    }
    errors
}

// ============================================================================
// Tests
// ============================================================================
