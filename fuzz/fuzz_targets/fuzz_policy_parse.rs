#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::Value;
use warden_abac::{Effect, Rule, wire};

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    if let Ok(policy) = wire::parse(value.clone()) {
        validate_rule_sequence(policy.rules());
    }

    if let Ok(stored) = wire::parse_stored_policy(value.clone()) {
        validate_rule_sequence(stored.policy.rules());
    }

    if let Ok(set) = wire::parse_policy_set(value.clone()) {
        for stored in &set.policies {
            validate_rule_sequence(stored.policy.rules());
        }
    }

    if let Ok(sets) = wire::parse_policy_sets(value) {
        for set in &sets {
            for stored in &set.policies {
                validate_rule_sequence(stored.policy.rules());
            }
        }
    }
});

/// Every successfully parsed policy holds exactly one Permit, in front.
fn validate_rule_sequence(rules: &[Rule]) {
    assert_eq!(
        rules.first().map(Rule::effect),
        Some(Effect::Permit),
        "parsed policy must start with its Permit rule"
    );
    assert!(
        rules[1..].iter().all(|r| r.effect() == Effect::Deny),
        "every rule after the first must be a Deny"
    );
}
