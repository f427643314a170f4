#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use warden_abac::{Policy, PolicySet, Target, wire};

// ============================================================================
// Arbitrary Implementations
// ============================================================================

/// Fuzzer-friendly Target with Arbitrary derivation.
#[derive(Debug, Clone, Arbitrary)]
struct FuzzTarget {
    actions: Vec<String>,
    resource_type: String,
    identifiers: Vec<String>,
    attributes: Vec<String>,
}

impl FuzzTarget {
    fn to_target(&self) -> Target {
        Target::new(self.resource_type.clone())
            .with_actions(self.actions.iter().cloned())
            .with_identifiers(self.identifiers.iter().cloned())
            .with_attributes(self.attributes.iter().cloned())
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzPolicy {
    target: FuzzTarget,
    service_providers: Vec<String>,
    exceptions: Vec<FuzzTarget>,
}

impl FuzzPolicy {
    fn to_policy(&self) -> Policy {
        let mut policy = Policy::new(self.target.to_target())
            .with_service_providers(self.service_providers.iter().cloned());
        for exception in &self.exceptions {
            policy = policy.with_exception(exception.to_target());
        }
        policy
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzPolicySet {
    policy_issuer: String,
    access_subject: String,
    policies: Vec<FuzzPolicy>,
}

fuzz_target!(|input: FuzzPolicySet| {
    let mut set = PolicySet::new(input.policy_issuer.clone(), input.access_subject.clone());
    for fuzz_policy in &input.policies {
        let policy = fuzz_policy.to_policy();

        // Policy round trip through the nested request shape.
        let payload = serde_json::to_value(wire::compile(&policy)).expect("payload serializes");
        let parsed = wire::parse(payload).expect("compiled policy parses");
        assert_eq!(parsed, policy, "policy changed across compile/parse");

        set = set.with_policy(policy);
    }

    // The set payload carries every policy in order.
    let payload = wire::compile_policy_set(&set);
    assert_eq!(payload.policies.len(), set.policies.len());
    assert_eq!(payload.max_delegation_depth, wire::MAX_DELEGATION_DEPTH);
    for (compiled, policy) in payload.policies.iter().zip(&set.policies) {
        assert_eq!(compiled.rules.len(), policy.rules().len());
    }
});
