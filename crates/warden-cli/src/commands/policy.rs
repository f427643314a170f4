//! Policy commands.

use anyhow::{Context, Result};
use warden_abac::{PolicyId, PolicySetId};
use warden_authoring::{Flow, SubmitOutcome, Wizard};

use crate::session::CliGateway;
use crate::style::{self, SemanticStyle};
use crate::{GlobalArgs, prompt, session};

/// Show a policy and its ordered rules.
pub async fn show(global: &GlobalArgs, policy_set_id: &str, policy_id: &str) -> Result<()> {
    let gateway = session::connect(global)?;
    let policy_set_id = PolicySetId::new(policy_set_id);
    let policy_id = PolicyId::new(policy_id);

    let stored = gateway
        .get_policy(&policy_set_id, &policy_id)
        .await
        .with_context(|| format!("Failed to fetch policy {policy_id} of set {policy_set_id}"))?;

    style::print_heading(&format!("Policy {}", stored.id.code()));
    style::print_labeled(
        "Service providers",
        &style::join_set(&stored.policy.service_providers),
    );
    style::print_spacer();
    println!("{}", style::rules_table(&stored.policy));
    Ok(())
}

/// Add a policy to a set through the interactive wizard.
pub async fn add(global: &GlobalArgs, policy_set_id: &str) -> Result<()> {
    let gateway = session::connect(global)?;
    let policy_set_id = PolicySetId::new(policy_set_id);

    // Fail before prompting if the set does not exist.
    gateway
        .get_policy_set(&policy_set_id)
        .await
        .with_context(|| format!("Failed to fetch policy set {policy_set_id}"))?;

    run_wizard(&gateway, Wizard::new(Flow::AddPolicy { policy_set_id })).await
}

/// Edit a stored policy through the interactive wizard.
pub async fn edit(global: &GlobalArgs, policy_set_id: &str, policy_id: &str) -> Result<()> {
    let gateway = session::connect(global)?;
    let policy_set_id = PolicySetId::new(policy_set_id);
    let policy_id = PolicyId::new(policy_id);

    let stored = gateway
        .get_policy(&policy_set_id, &policy_id)
        .await
        .with_context(|| format!("Failed to fetch policy {policy_id} of set {policy_set_id}"))?;

    let flow = Flow::EditPolicy {
        policy_set_id,
        policy_id,
        seed: stored.policy,
    };
    run_wizard(&gateway, Wizard::new(flow)).await
}

/// Delete a policy.
pub async fn delete(
    global: &GlobalArgs,
    policy_set_id: &str,
    policy_id: &str,
    force: bool,
) -> Result<()> {
    let gateway = session::connect(global)?;
    let policy_set_id = PolicySetId::new(policy_set_id);
    let policy_id = PolicyId::new(policy_id);

    if !force
        && !prompt::confirm_destructive(&format!(
            "Delete policy {policy_id} from set {policy_set_id}?"
        ))?
    {
        println!("Cancelled.");
        return Ok(());
    }

    gateway
        .delete_policy(&policy_set_id, &policy_id)
        .await
        .with_context(|| format!("Failed to delete policy {policy_id}"))?;

    style::print_success(&format!("Policy {} deleted", policy_id.code()));
    Ok(())
}

async fn run_wizard(gateway: &CliGateway, mut wizard: Wizard) -> Result<()> {
    match prompt::drive(&mut wizard, gateway).await? {
        Some(SubmitOutcome::PolicyAdded(Some(stored))) => {
            style::print_success(&format!("Policy {} added", stored.id.code()));
        }
        Some(SubmitOutcome::PolicyAdded(None)) => {
            style::print_success("Policy added");
        }
        Some(SubmitOutcome::PolicyReplaced(Some(stored))) => {
            style::print_success(&format!("Policy {} updated", stored.id.code()));
        }
        Some(SubmitOutcome::PolicyReplaced(None)) => {
            style::print_success("Policy updated");
        }
        Some(SubmitOutcome::PolicySetCreated(_)) => {}
        None => {
            wizard.abandon();
            println!("Cancelled.");
        }
    }
    Ok(())
}
