//! Path utilities and XDG directory discovery

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// XDG-compliant paths for Warden
pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("org", "Warden", "warden"),
        }
    }

    /// User config directory (~/.config/warden/)
    pub fn user_config_dir(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|p| p.config_dir().to_path_buf())
            .ok_or_else(|| {
                ConfigError::XdgError("Failed to determine user config directory".to_string())
            })
    }

    /// User config file (~/.config/warden/config.toml)
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.user_config_dir()?.join("config.toml"))
    }

    /// Project config file (warden.toml)
    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("warden.toml")
    }

    /// Local override file (warden.local.toml, gitignored)
    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("warden.local.toml")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_xdg_paths() {
        let paths = Paths::new();

        // Not every platform has a home directory in CI.
        if let Ok(config_file) = paths.user_config_file() {
            assert!(config_file.to_string_lossy().contains("warden"));
            assert!(config_file.ends_with("config.toml"));
        }
    }

    #[test]
    fn test_project_paths() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        assert_eq!(
            Paths::project_config_file(project_dir),
            project_dir.join("warden.toml")
        );
        assert_eq!(
            Paths::local_config_file(project_dir),
            project_dir.join("warden.local.toml")
        );
    }
}
