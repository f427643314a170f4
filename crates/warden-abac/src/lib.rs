//! # warden-abac: Policy data model and rule compiler
//!
//! Describes the access-control entities a registry stores (policy sets,
//! policies, rules, targets) and compiles them to and from the registry's
//! JSON wire shapes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  PolicySet (issuer, access subject)          │
//! │  └─ Policy (target, service providers)       │
//! │     ├─ rules[0]  Permit  (policy target)     │
//! │     └─ rules[1..] Deny   (exception targets) │
//! └─────────────────┬───────────────────────────┘
//!                   │ wire::compile / compile_policy_set
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Wire payloads                               │
//! │  target / resource / environment grouping    │
//! └─────────────────┬───────────────────────────┘
//!                   │ wire::parse / parse_policy_set(s)
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Result<Entity, ParseError>                  │
//! │  (never a partially populated entity)        │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Evaluation is deny-overrides: a request is permitted iff it matches the
//! policy target and no exception target. The registry evaluates; this crate
//! only builds and round-trips the rules.
//!
//! ## Examples
//!
//! ```
//! use warden_abac::{Policy, Target, wire};
//!
//! let policy = Policy::new(
//!     Target::new("document")
//!         .with_actions(["read"])
//!         .with_identifiers(["*"])
//!         .with_attributes(["*"]),
//! )
//! .with_service_providers(["did:ishare:EU.NL.NTRNL-10000001"])
//! .with_exception(
//!     Target::new("document")
//!         .with_actions(["delete"])
//!         .with_identifiers(["42"])
//!         .with_attributes(["*"]),
//! );
//!
//! let payload = serde_json::to_value(wire::compile(&policy)).unwrap();
//! assert_eq!(wire::parse(payload).unwrap(), policy);
//! ```

pub mod ids;
pub mod policy;
pub mod target;
pub mod wire;


pub use ids::{PolicyId, PolicySetId};
pub use policy::{
    Effect, Policy, PolicySet, Rule, RuleSequenceError, StoredPolicy, StoredPolicySet,
};
pub use target::{Target, WILDCARD};
pub use wire::{ParseError, compile, compile_policy_set, parse};
