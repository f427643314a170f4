//! Table formatting using comfy-table.

use std::collections::BTreeSet;

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use warden_abac::{Policy, StoredPolicy, StoredPolicySet, Target};

use super::colors::SemanticStyle;

/// Creates an empty table with the house style and a bold header.
pub fn styled_table(columns: &[&str]) -> Table {
    let mut table = Table::new();

    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = columns
        .iter()
        .map(|col| {
            if super::no_color() {
                Cell::new(col)
            } else {
                Cell::new(col)
                    .add_attribute(Attribute::Bold)
                    .fg(Color::Cyan)
            }
        })
        .collect();
    table.set_header(header_cells);

    table
}

/// Joins a set for display; an empty set shows as a dash.
pub fn join_set(values: &BTreeSet<String>) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Resource identifiers and attributes read "all" when the wildcard covers
/// them.
fn target_cells(target: &Target) -> [String; 4] {
    let all_or = |covers_all: bool, values: &BTreeSet<String>| {
        if covers_all {
            "all".to_string()
        } else {
            join_set(values)
        }
    };
    [
        target.resource_type.clone(),
        join_set(&target.actions),
        all_or(target.covers_all_identifiers(), &target.identifiers),
        all_or(target.covers_all_attributes(), &target.attributes),
    ]
}

/// One row per policy set.
pub fn policy_sets_table(sets: &[StoredPolicySet]) -> Table {
    let mut table = styled_table(&["ID", "Policy issuer", "Access subject", "Policies"]);
    for set in sets {
        table.add_row(vec![
            set.id.to_string(),
            set.policy_issuer.clone(),
            set.access_subject.clone(),
            set.policies.len().to_string(),
        ]);
    }
    table
}

/// One row per policy, keyed by a registry ID or a draft position.
pub fn policies_table<'a>(policies: impl IntoIterator<Item = (String, &'a Policy)>) -> Table {
    let mut table = styled_table(&[
        "ID",
        "Resource type",
        "Actions",
        "Identifiers",
        "Attributes",
        "Service providers",
        "Exceptions",
    ]);
    for (id, policy) in policies {
        let mut row = vec![id];
        row.extend(target_cells(&policy.target));
        row.push(join_set(&policy.service_providers));
        row.push(policy.exception_count().to_string());
        table.add_row(row);
    }
    table
}

/// Rows for the policies of a stored set.
pub fn stored_policy_rows(policies: &[StoredPolicy]) -> impl Iterator<Item = (String, &Policy)> {
    policies.iter().map(|p| (p.id.to_string(), &p.policy))
}

/// The ordered rules of one policy: the Permit first, then each Deny.
pub fn rules_table(policy: &Policy) -> Table {
    let mut table = styled_table(&[
        "#",
        "Effect",
        "Resource type",
        "Actions",
        "Identifiers",
        "Attributes",
    ]);
    for (index, rule) in policy.rules().iter().enumerate() {
        let target = rule.exception_target().unwrap_or(&policy.target);
        let effect = rule.effect().to_string();
        let effect = if rule.exception_target().is_some() {
            effect.error()
        } else {
            effect.success()
        };

        let mut row = vec![index.to_string(), effect];
        row.extend(target_cells(target));
        table.add_row(row);
    }
    table
}

/// Prints a table followed by a muted count footer.
pub fn print_counted(table: &Table, count: usize, singular: &str, plural: &str) {
    println!("{table}");
    let noun = if count == 1 { singular } else { plural };
    println!("{}", format!("({count} {noun})").muted());
}
