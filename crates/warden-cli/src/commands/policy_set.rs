//! Policy set commands.

use anyhow::{Context, Result};
use warden_abac::PolicySetId;
use warden_authoring::{Flow, SubmitOutcome, Wizard};
use warden_sync::ListFilter;

use crate::style::{self, SemanticStyle};
use crate::{GlobalArgs, prompt, session};

/// List policy sets, optionally filtered.
pub async fn list(
    global: &GlobalArgs,
    access_subject: Option<String>,
    policy_issuer: Option<String>,
) -> Result<()> {
    let gateway = session::connect(global)?;
    let filter = ListFilter {
        access_subject,
        policy_issuer,
    };

    let sets = gateway
        .list_policy_sets(&filter)
        .await
        .context("Failed to list policy sets")?;

    if sets.is_empty() {
        println!("{}", "No policy sets found.".muted());
        return Ok(());
    }

    let table = style::policy_sets_table(&sets);
    style::print_counted(&table, sets.len(), "policy set", "policy sets");
    Ok(())
}

/// Show a policy set with one row per policy.
pub async fn show(global: &GlobalArgs, id: &str) -> Result<()> {
    let gateway = session::connect(global)?;
    let id = PolicySetId::new(id);

    let set = gateway
        .get_policy_set(&id)
        .await
        .with_context(|| format!("Failed to fetch policy set {id}"))?;

    style::print_heading(&format!("Policy set {}", set.id.code()));
    style::print_labeled("Policy issuer", &set.policy_issuer);
    style::print_labeled("Access subject", &set.access_subject);
    style::print_spacer();

    let table = style::policies_table(style::stored_policy_rows(&set.policies));
    style::print_counted(&table, set.policies.len(), "policy", "policies");
    Ok(())
}

/// Create a policy set through the interactive wizard.
pub async fn create(global: &GlobalArgs) -> Result<()> {
    let gateway = session::connect(global)?;
    let mut wizard = Wizard::new(Flow::NewPolicySet);

    match prompt::drive(&mut wizard, &gateway).await? {
        Some(SubmitOutcome::PolicySetCreated(Some(set))) => {
            style::print_success(&format!(
                "Policy set {} created with {} policies",
                set.id.code(),
                set.policies.len()
            ));
        }
        Some(SubmitOutcome::PolicySetCreated(None)) => {
            style::print_success("Policy set created");
        }
        Some(_) => {}
        None => {
            wizard.abandon();
            println!("Cancelled.");
        }
    }
    Ok(())
}

/// Delete a policy set.
pub async fn delete(global: &GlobalArgs, id: &str, force: bool) -> Result<()> {
    let gateway = session::connect(global)?;
    let id = PolicySetId::new(id);

    if !force
        && !prompt::confirm_destructive(&format!(
            "Delete policy set {id} and all of its policies?"
        ))?
    {
        println!("Cancelled.");
        return Ok(());
    }

    gateway
        .delete_policy_set(&id)
        .await
        .with_context(|| format!("Failed to delete policy set {id}"))?;

    style::print_success(&format!("Policy set {} deleted", id.code()));
    Ok(())
}
