//! Configuration resolution and gateway construction.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;
use warden_config::WardenConfig;
use warden_sync::{Gateway, HttpConfig, HttpTransport, Scope, SieveReadCache};

use crate::GlobalArgs;

/// Gateway type used by every registry command.
pub type CliGateway = Gateway<HttpTransport, Arc<SieveReadCache>>;

/// Loads configuration from `project_dir` and applies command-line overrides.
pub fn load_config(global: &GlobalArgs, project_dir: impl AsRef<Path>) -> Result<WardenConfig> {
    let mut config =
        WardenConfig::load_from_dir(project_dir).context("Failed to load configuration")?;

    if let Some(registry) = &global.registry {
        config.registry.base_url.clone_from(registry);
    }
    if global.admin {
        config.registry.admin = true;
    }
    if let Some(token) = &global.token {
        config.auth.token = Some(token.clone());
    }

    config
        .validate()
        .context("Invalid command-line overrides")?;
    Ok(config)
}

/// Builds a gateway for `config`.
pub fn gateway(config: &WardenConfig) -> Result<CliGateway> {
    let mut http = HttpConfig::new(config.registry.base_url.clone()).with_timeout(config.timeout());
    if let Some(token) = &config.auth.token {
        http = http.with_token(token.clone());
    }

    let transport = HttpTransport::new(http)
        .with_context(|| format!("Failed to set up transport for {}", config.registry.base_url))?;
    let capacity = config
        .cache_capacity()
        .context("cache.capacity must be at least 1")?;
    let scope = Scope::from_admin(config.registry.admin);

    debug!(base_url = %transport.base_url(), scope = %scope, "gateway ready");
    Ok(Gateway::new(transport, SieveReadCache::shared(capacity), scope))
}

/// Loads configuration from the current directory and connects.
pub fn connect(global: &GlobalArgs) -> Result<CliGateway> {
    let config = load_config(global, ".")?;
    gateway(&config)
}
