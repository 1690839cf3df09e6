//! Stack configuration shared by the three provisioners.
//!
//! Values are layered: built-in defaults, then `stackup.toml`, then `STACKUP_`
//! environment variables (nested keys split on `__`, e.g.
//! `STACKUP_DATABASE__PASSWORD`). Command-line flags are applied on top by the
//! caller.

use std::path::Path;

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::fs::FsHandler;

/// The default name for the stackup configuration file.
pub const STACKUP_CONFIG_FILENAME: &str = "stackup.toml";

/// Prefix of environment variables overriding configuration values.
pub const ENV_PREFIX: &str = "STACKUP_";

/// Database superuser; the image sets it up from `MYSQL_ROOT_PASSWORD`.
pub const ROOT_USER: &str = "root";

/// Relational database settings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database created on first start.
    pub name: String,
    /// User the backend connects as.
    pub user: String,
    /// Password of that user, also used as the root password.
    pub password: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: "cms_db".to_string(),
            user: ROOT_USER.to_string(),
            password: "secret".to_string(),
        }
    }
}

/// Host ports published by the stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortsConfig {
    pub mysql: u16,
    pub redis: u16,
    pub backend: u16,
    pub frontend: u16,
    pub smtp: u16,
    pub mail_ui: u16,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            mysql: 3307,
            redis: 6379,
            backend: 8000,
            frontend: 3000,
            smtp: 1025,
            mail_ui: 8025,
        }
    }
}

/// Configuration for one provisioned stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackConfig {
    /// Project name, used as the container name prefix.
    pub project_name: String,
    /// Human-readable application name written to the backend environment.
    pub app_name: String,
    pub database: DatabaseConfig,
    pub ports: PortsConfig,
    /// Public API base URL used by the frontend.
    pub api_url: String,
    /// Public URL of the frontend.
    pub site_url: String,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            project_name: "cms-system".to_string(),
            app_name: "CMS System".to_string(),
            database: DatabaseConfig::default(),
            ports: PortsConfig::default(),
            api_url: "http://localhost:8000/api/v1".to_string(),
            site_url: "http://localhost:3000".to_string(),
        }
    }
}

impl StackConfig {
    /// Load the configuration, layering `path` (if it exists) and the
    /// environment over the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|err| anyhow::anyhow!("Failed to load stackup configuration: {}", err))?;

        tracing::debug!(path = %path.display(), project = %config.project_name, "Configuration loaded");
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize stack config to TOML")?;
        FsHandler::write_artifact(path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Check values that end up in container names, env files and URLs.
    pub fn validate(&self) -> Result<()> {
        let valid_project = self
            .project_name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric())
            && self
                .project_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid_project {
            anyhow::bail!(
                "Invalid project name '{}': use letters, digits, '_', '-' or '.', starting with a letter or digit",
                self.project_name
            );
        }

        if self.database.name.is_empty()
            || !self
                .database
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            anyhow::bail!(
                "Invalid database name '{}': use letters, digits and '_'",
                self.database.name
            );
        }

        if self.database.user.is_empty()
            || !self
                .database
                .user
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            anyhow::bail!(
                "Invalid database user '{}': use letters, digits and '_'",
                self.database.user
            );
        }

        if self.database.password.is_empty()
            || self.database.password.contains(['\n', '\r', '"', '\''])
        {
            anyhow::bail!("Database password must be non-empty and free of quotes and newlines");
        }

        for (name, url) in [("api_url", &self.api_url), ("site_url", &self.site_url)] {
            Url::parse(url).with_context(|| format!("Invalid {}: {}", name, url))?;
        }

        Ok(())
    }

    /// Name of the container running `service`.
    pub fn container_name(&self, service: impl std::fmt::Display) -> String {
        format!("{}_{}", self.project_name, service)
    }
}
