//! Warden CLI.
//!
//! Guided authoring of ABAC policies stored in an authorization registry.
//!
//! # Quick Start
//!
//! ```bash
//! # Point at a registry (or set it in warden.toml)
//! export WARDEN_REGISTRY__BASE_URL=https://ar.example.org/api
//! export WARDEN_AUTH__TOKEN=...
//!
//! # Browse
//! warden policy-set list
//! warden policy-set show <id>
//!
//! # Author
//! warden policy add <policy-set-id>
//! ```

mod commands;
mod prompt;
mod session;
mod style;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

/// Warden - guided ABAC policy authoring for authorization registries.
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options overriding the loaded configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Use the admin endpoints instead of the member ones.
    #[arg(long, global = true)]
    pub admin: bool,

    /// Registry base URL (e.g. https://ar.example.org/api).
    #[arg(long, global = true, value_name = "URL")]
    pub registry: Option<String>,

    /// Bearer token sent with every request.
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Policy set management commands.
    #[command(subcommand)]
    PolicySet(PolicySetCommands),

    /// Policy management commands.
    #[command(subcommand)]
    Policy(PolicyCommands),

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum PolicySetCommands {
    /// List policy sets.
    List {
        /// Only sets granted to this access subject.
        #[arg(long)]
        access_subject: Option<String>,

        /// Only sets issued by this party.
        #[arg(long)]
        policy_issuer: Option<String>,
    },

    /// Show one policy set and its policies.
    Show {
        /// Policy set ID.
        id: String,
    },

    /// Create a policy set with the interactive wizard.
    Create,

    /// Delete a policy set.
    Delete {
        /// Policy set ID.
        id: String,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum PolicyCommands {
    /// Show one policy and its rules.
    Show {
        /// Policy set ID.
        policy_set_id: String,

        /// Policy ID.
        policy_id: String,
    },

    /// Add a policy to a set with the interactive wizard.
    Add {
        /// Policy set ID.
        policy_set_id: String,
    },

    /// Edit a stored policy with the interactive wizard.
    Edit {
        /// Policy set ID.
        policy_set_id: String,

        /// Policy ID.
        policy_id: String,
    },

    /// Delete a policy.
    Delete {
        /// Policy set ID.
        policy_set_id: String,

        /// Policy ID.
        policy_id: String,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration.
    Show {
        /// Project directory to load warden.toml from.
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Output format (toml, json).
        #[arg(short, long, default_value = "toml")]
        format: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging; stdout stays reserved for command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    style::set_no_color(cli.global.no_color);
    let global = cli.global;

    match cli.command {
        Commands::PolicySet(cmd) => match cmd {
            PolicySetCommands::List {
                access_subject,
                policy_issuer,
            } => commands::policy_set::list(&global, access_subject, policy_issuer).await,
            PolicySetCommands::Show { id } => commands::policy_set::show(&global, &id).await,
            PolicySetCommands::Create => commands::policy_set::create(&global).await,
            PolicySetCommands::Delete { id, force } => {
                commands::policy_set::delete(&global, &id, force).await
            }
        },
        Commands::Policy(cmd) => match cmd {
            PolicyCommands::Show {
                policy_set_id,
                policy_id,
            } => commands::policy::show(&global, &policy_set_id, &policy_id).await,
            PolicyCommands::Add { policy_set_id } => {
                commands::policy::add(&global, &policy_set_id).await
            }
            PolicyCommands::Edit {
                policy_set_id,
                policy_id,
            } => commands::policy::edit(&global, &policy_set_id, &policy_id).await,
            PolicyCommands::Delete {
                policy_set_id,
                policy_id,
                force,
            } => commands::policy::delete(&global, &policy_set_id, &policy_id, force).await,
        },
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show { project, format } => {
                commands::config::show(&global, &project, &format)
            }
        },
    }
}
