//! Configuration loader with multi-source merging

use crate::{Paths, WardenConfig};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    env_vars: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Create a new config loader rooted at the current directory
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "WARDEN".to_string(),
            env_vars: None,
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "WARDEN")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Read environment overrides from `vars` instead of the process
    /// environment.
    pub fn with_env_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.env_vars = Some(vars);
        self
    }

    /// Load configuration from all sources with proper precedence, then
    /// validate it.
    pub fn load(self) -> Result<WardenConfig> {
        let mut builder = config::Config::builder();

        // 1. Built-in defaults
        let defaults = WardenConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/warden/config.toml)
        let paths = Paths::new();
        if let Ok(user_config_file) = paths.user_config_file() {
            if user_config_file.exists() {
                builder = builder.add_source(
                    config::File::from(user_config_file)
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        // 3. Project config (warden.toml)
        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Local config (warden.local.toml, gitignored)
        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (WARDEN_REGISTRY__BASE_URL, ...)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(self.env_vars),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let warden_config: WardenConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        warden_config
            .validate()
            .context("Configuration failed validation")?;

        Ok(warden_config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
