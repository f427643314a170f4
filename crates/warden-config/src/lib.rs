//! Configuration management for Warden
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence, applied by the binary)
//! 2. Environment variables (WARDEN_* prefix, `__` between sections)
//! 3. warden.local.toml (gitignored, local overrides)
//! 4. warden.toml (git-tracked, project config)
//! 5. ~/.config/warden/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;
use url::Url;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main Warden configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub registry: RegistryConfig,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
}

/// Where the authorization registry lives and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub base_url: String,
    /// Use the `/admin` endpoint family instead of the member one.
    pub admin: bool,
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4000/api".to_string(),
            admin: false,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached registry reads.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl WardenConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.registry.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "registry.base_url must not be empty".to_string(),
            ));
        }

        let parsed = Url::parse(base_url).map_err(|e| {
            ConfigError::ValidationError(format!("registry.base_url `{base_url}`: {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError(format!(
                "registry.base_url must use http or https, got `{}`",
                parsed.scheme()
            )));
        }

        if self.cache.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "cache.capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.registry.timeout_secs)
    }

    /// Cache capacity, or `None` when unvalidated config holds zero.
    pub fn cache_capacity(&self) -> Option<NonZeroUsize> {
        NonZeroUsize::new(self.cache.capacity)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Copy safe to print: the bearer token is masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.auth.token.is_some() {
            config.auth.token = Some("********".to_string());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WardenConfig::default();
        assert_eq!(config.registry.base_url, "http://127.0.0.1:4000/api");
        assert!(!config.registry.admin);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.cache_capacity(), NonZeroUsize::new(256));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = WardenConfig::default();
        config.registry.base_url = "  ".to_string();
        assert!(config.validate().is_err());

        config.registry.base_url = "ftp://registry.example.org".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http or https"));

        config.registry.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = WardenConfig::default();
        config.cache.capacity = 0;
        assert!(config.validate().is_err());
        assert!(config.cache_capacity().is_none());
    }

    #[test]
    fn test_redacted_masks_token() {
        let mut config = WardenConfig::default();
        config.auth.token = Some("secret".to_string());

        let rendered = config.redacted().to_toml().expect("Failed to render config");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[registry]"));
        assert!(rendered.contains("********"));

        assert_eq!(config.auth.token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = WardenConfig::default();
        config.registry.admin = true;
        config.cache.capacity = 8;

        let rendered = config.to_toml().expect("Failed to render config");
        let parsed: WardenConfig = toml::from_str(&rendered).expect("Failed to parse config");
        assert!(parsed.registry.admin);
        assert_eq!(parsed.cache.capacity, 8);
    }
}
