//! Terminal projection of the authoring wizard.
//!
//! Prompts collect the values of the current step and hand them to the
//! [`Wizard`]; the wizard decides whether the step is complete. Validation
//! errors are printed and the step is asked again.

use std::collections::BTreeSet;

use anyhow::{Result, bail};
use console::Term;
use dialoguer::theme::{ColorfulTheme, SimpleTheme, Theme};
use dialoguer::{Confirm, Input, Select};
use warden_abac::{Policy, Target};
use warden_authoring::{
    FieldErrors, PolicyFields, PolicySetFields, StepInput, StepKind, SubmitOutcome, Wizard,
    WizardError,
};

use crate::session::CliGateway;
use crate::style::{self, SemanticStyle};

/// Runs `wizard` to completion. Returns `None` when the user abandons it.
pub async fn drive(wizard: &mut Wizard, gateway: &CliGateway) -> Result<Option<SubmitOutcome>> {
    if !Term::stdout().is_term() {
        bail!("The authoring wizard needs an interactive terminal");
    }

    let theme = theme();
    let theme = theme.as_ref();

    loop {
        let Some(step) = wizard.current_step() else {
            bail!("Wizard left the authoring steps in state {}", wizard.state());
        };

        style::print_spacer();
        style::print_heading(&format!(
            "{} {}",
            wizard.state().to_string().muted(),
            step.to_string().header()
        ));

        match step {
            StepKind::DefinePolicy => {
                let seed = wizard
                    .draft()
                    .policy()
                    .map(PolicyFields::from_policy)
                    .unwrap_or_default();
                let fields = prompt_policy_fields(theme, &seed)?;
                checked(wizard.advance(StepInput::Policy(fields)))?;
            }
            StepKind::AddExceptions => {
                if let Some(policy) = wizard.draft().policy() {
                    println!("{}", style::rules_table(policy));
                }
                match menu(theme, &["Add exception", "Remove exception", "Continue", "Back"])? {
                    0 => {
                        let target = prompt_target(theme, "Exception")?;
                        if let Some(count) = checked(wizard.add_exception(target))? {
                            style::print_success(&format!("{count} exception(s) in draft"));
                        }
                    }
                    1 => {
                        let labels: Vec<String> = wizard
                            .draft()
                            .policy()
                            .map(|p| p.exceptions().map(describe_target).collect())
                            .unwrap_or_default();
                        if let Some(index) = pick(theme, "Remove which exception?", &labels)? {
                            checked(wizard.remove_exception(index))?;
                        }
                    }
                    2 => {
                        checked(wizard.advance(StepInput::Continue))?;
                    }
                    _ => {
                        checked(wizard.retreat())?;
                    }
                }
            }
            StepKind::DefinePolicySet => {
                let seed = wizard
                    .draft()
                    .policy_set()
                    .map(PolicySetFields::from_policy_set)
                    .unwrap_or_default();
                let fields = PolicySetFields::new(
                    text(theme, "Policy issuer", &seed.policy_issuer)?,
                    text(theme, "Access subject", &seed.access_subject)?,
                );
                checked(wizard.advance(StepInput::PolicySet(fields)))?;
            }
            StepKind::AddPolicies => {
                if let Some(set) = wizard.draft().policy_set() {
                    let rows = set
                        .policies
                        .iter()
                        .enumerate()
                        .map(|(i, p)| ((i + 1).to_string(), p));
                    println!("{}", style::policies_table(rows));
                }
                match menu(theme, &["Add policy", "Remove policy", "Continue", "Back"])? {
                    0 => {
                        let policy = prompt_policy(theme)?;
                        if let Some(count) = checked(wizard.add_policy(policy))? {
                            style::print_success(&format!("{count} policy(ies) in draft"));
                        }
                    }
                    1 => {
                        let labels: Vec<String> = wizard
                            .draft()
                            .policy_set()
                            .map(|s| {
                                s.policies.iter().map(|p| describe_target(&p.target)).collect()
                            })
                            .unwrap_or_default();
                        if let Some(index) = pick(theme, "Remove which policy?", &labels)? {
                            checked(wizard.remove_policy(index))?;
                        }
                    }
                    2 => {
                        checked(wizard.advance(StepInput::Continue))?;
                    }
                    _ => {
                        checked(wizard.retreat())?;
                    }
                }
            }
            StepKind::Review => {
                print_review(wizard);
                match menu(theme, &["Submit", "Back", "Abandon"])? {
                    0 => loop {
                        match wizard.submit(gateway).await {
                            Ok(outcome) => return Ok(Some(outcome)),
                            Err(WizardError::Sync(error)) => {
                                style::print_error(&format!("Submission failed: {error}"));
                                if !error.is_retryable() {
                                    style::print_hint(
                                        "Sending the same draft again would fail the same way",
                                    );
                                    break;
                                }
                                if !confirm(theme, "Retry?", true)? {
                                    return Ok(None);
                                }
                            }
                            Err(other) => return Err(other.into()),
                        }
                    },
                    1 => {
                        checked(wizard.retreat())?;
                    }
                    _ => return Ok(None),
                }
            }
        }
    }
}

/// Maps validation failures to a printed report; other wizard errors abort.
fn checked<T>(result: Result<T, WizardError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(WizardError::Validation(errors)) => {
            print_field_errors(&errors);
            Ok(None)
        }
        Err(other) => Err(other.into()),
    }
}

pub fn print_field_errors(errors: &FieldErrors) {
    for (field, field_errors) in errors.iter() {
        for error in field_errors {
            style::print_error(&format!("{field}: {error}"));
        }
    }
}

fn print_review(wizard: &Wizard) {
    if let Some(policy) = wizard.draft().policy() {
        style::print_labeled(
            "Service providers",
            &style::join_set(&policy.service_providers),
        );
        println!("{}", style::rules_table(policy));
    }
    if let Some(set) = wizard.draft().policy_set() {
        style::print_labeled("Policy issuer", &set.policy_issuer);
        style::print_labeled("Access subject", &set.access_subject);
        let rows = set
            .policies
            .iter()
            .enumerate()
            .map(|(i, p)| ((i + 1).to_string(), p));
        style::print_counted(&style::policies_table(rows), set.policies.len(), "policy", "policies");
    }
    if let Some(error) = wizard.last_error() {
        style::print_warn(&format!("Last attempt failed: {error}"));
    }
}

// ============================================================================
// Field prompts
// ============================================================================

fn prompt_policy_fields(theme: &dyn Theme, seed: &PolicyFields) -> Result<PolicyFields> {
    style::print_hint("Separate values with commas; \"*\" alone matches every value.");
    Ok(PolicyFields {
        resource_type: text(theme, "Resource type", &seed.resource_type)?,
        actions: set(theme, "Actions", &seed.actions)?,
        identifiers: set(theme, "Identifiers", &seed.identifiers)?,
        attributes: set(theme, "Attributes", &seed.attributes)?,
        service_providers: set(theme, "Service providers", &seed.service_providers)?,
    })
}

fn prompt_target(theme: &dyn Theme, label: &str) -> Result<Target> {
    let empty = BTreeSet::new();
    Ok(Target {
        resource_type: text(theme, &format!("{label} resource type"), "")?
            .trim()
            .to_string(),
        actions: set(theme, &format!("{label} actions"), &empty)?,
        identifiers: set(theme, &format!("{label} identifiers"), &empty)?,
        attributes: set(theme, &format!("{label} attributes"), &empty)?,
    })
}

/// A complete policy for the policy-set flow, exceptions included.
fn prompt_policy(theme: &dyn Theme) -> Result<Policy> {
    let fields = prompt_policy_fields(theme, &PolicyFields::default())?;
    let mut policy =
        Policy::new(fields.target()).with_service_providers(fields.service_providers);

    while confirm(theme, "Add an exception to this policy?", false)? {
        policy.push_exception(prompt_target(theme, "Exception")?);
    }
    Ok(policy)
}

fn theme() -> Box<dyn Theme> {
    if style::no_color() {
        Box::new(SimpleTheme)
    } else {
        Box::new(ColorfulTheme::default())
    }
}

fn text(theme: &dyn Theme, prompt: &str, initial: &str) -> Result<String> {
    Ok(Input::<String>::with_theme(theme)
        .with_prompt(prompt)
        .with_initial_text(initial)
        .allow_empty(true)
        .interact_text()?)
}

fn set(theme: &dyn Theme, prompt: &str, initial: &BTreeSet<String>) -> Result<BTreeSet<String>> {
    let initial = initial.iter().cloned().collect::<Vec<_>>().join(", ");
    Ok(parse_set(&text(theme, prompt, &initial)?))
}

fn menu(theme: &dyn Theme, items: &[&str]) -> Result<usize> {
    Ok(Select::with_theme(theme)
        .with_prompt("Next")
        .items(items)
        .default(0)
        .interact()?)
}

fn pick(theme: &dyn Theme, prompt: &str, labels: &[String]) -> Result<Option<usize>> {
    if labels.is_empty() {
        style::print_warn("Nothing to remove");
        return Ok(None);
    }
    Ok(Select::with_theme(theme)
        .with_prompt(prompt)
        .items(labels)
        .default(0)
        .interact_opt()?)
}

pub fn confirm(theme: &dyn Theme, prompt: &str, default: bool) -> Result<bool> {
    Ok(Confirm::with_theme(theme)
        .with_prompt(prompt)
        .default(default)
        .interact()?)
}

/// Confirmation with the house theme, for commands outside the wizard.
pub fn confirm_destructive(prompt: &str) -> Result<bool> {
    if !Term::stdout().is_term() {
        bail!("Refusing to prompt without a terminal; pass --force");
    }
    confirm(theme().as_ref(), prompt, false)
}

/// Splits comma-separated input into a set, dropping blanks.
pub fn parse_set(input: &str) -> BTreeSet<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn describe_target(target: &Target) -> String {
    format!(
        "{} [{}] ids={} attrs={}",
        target.resource_type,
        style::join_set(&target.actions),
        style::join_set(&target.identifiers),
        style::join_set(&target.attributes),
    )
}
