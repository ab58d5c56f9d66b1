//! Layered application configuration: built-in defaults, an optional TOML
//! file, then `ARQIV__*` environment overrides.

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "ARQIV";

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthSettings,
    pub storage: StorageConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Allowed CORS origins. Empty disables cross-origin access.
    pub allowed_origins: Vec<String>,
    /// Maximum request body size for uploads (in megabytes).
    pub max_upload_size_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8420,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8080".to_string(),
            ],
            max_upload_size_mb: 100,
        }
    }
}

/// Identity provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Base URL of the identity provider.
    pub server_url: String,
    /// Realm this service authenticates against.
    pub realm: String,
    /// Confidential client this service introspects with.
    pub client_id: String,
    /// Client secret. Supports `env:VAR_NAME` indirection; REQUIRED at
    /// startup, never defaulted.
    pub client_secret: Option<String>,
    /// Client whose role grants the frontend queries directly.
    pub frontend_client: String,
    /// Timeout for provider round trips (seconds).
    pub http_timeout_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            realm: "arqiv".to_string(),
            client_id: "arqiv_be".to_string(),
            // No default secret - must be explicitly configured
            client_secret: None,
            frontend_client: "arqiv_fe".to_string(),
            http_timeout_secs: 10,
        }
    }
}

/// Storage layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory holding `remote/`, `backup/` and `preview/`.
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration. `None` means defaults + environment only. When a
    /// file path is given but nothing exists there yet, a commented default
    /// file is written first so a fresh deployment starts from an editable
    /// template.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                Self::write_default(path)?;
            }
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }

        let built = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("assembling configuration")?;

        built
            .try_deserialize()
            .context("deserializing configuration")
    }

    fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }

        let rendered =
            toml::to_string_pretty(&Self::default()).context("serializing default configuration")?;
        let body = format!(
            "# Configuration for arqiv\n# File: {}\n\n{rendered}",
            path.display()
        );
        std::fs::write(path, body)
            .with_context(|| format!("writing default config to {}", path.display()))
    }
}

impl AuthSettings {
    /// Resolve the client secret, expanding `env:VAR_NAME` syntax.
    pub fn resolve_client_secret(&self) -> Result<String, ConfigValidationError> {
        let Some(value) = &self.client_secret else {
            return Err(ConfigValidationError::MissingClientSecret);
        };

        if let Some(var_name) = value.strip_prefix("env:") {
            match std::env::var(var_name) {
                Ok(secret) if !secret.is_empty() => Ok(secret),
                Ok(_) => Err(ConfigValidationError::EnvVarEmpty(var_name.to_string())),
                Err(_) => Err(ConfigValidationError::EnvVarNotFound(var_name.to_string())),
            }
        } else if value.is_empty() {
            Err(ConfigValidationError::MissingClientSecret)
        } else {
            Ok(value.clone())
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// A client secret is required to talk to the identity provider.
    MissingClientSecret,
    /// Environment variable not found (for `env:VAR_NAME` syntax).
    EnvVarNotFound(String),
    /// Environment variable is empty (for `env:VAR_NAME` syntax).
    EnvVarEmpty(String),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingClientSecret => {
                write!(
                    f,
                    "identity provider client secret is required. Set ARQIV__AUTH__CLIENT_SECRET or auth.client_secret in config."
                )
            }
            Self::EnvVarNotFound(var) => {
                write!(
                    f,
                    "Environment variable '{}' not found (referenced via env:{} in config).",
                    var, var
                )
            }
            Self::EnvVarEmpty(var) => {
                write!(
                    f,
                    "Environment variable '{}' is empty (referenced via env:{} in config).",
                    var, var
                )
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}
