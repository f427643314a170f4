//! Configuration commands.

use anyhow::{Result, bail};

use crate::{GlobalArgs, session};

/// Show the effective configuration. The bearer token is masked.
pub fn show(global: &GlobalArgs, project: &str, format: &str) -> Result<()> {
    let config = session::load_config(global, project)?.redacted();

    match format {
        "toml" => print!("{}", config.to_toml()?),
        "json" => println!("{}", serde_json::to_string_pretty(&config)?),
        other => bail!("Unknown format '{other}' (expected toml or json)"),
    }
    Ok(())
}
